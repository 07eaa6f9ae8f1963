//! A minimal binary Merkle tree over leaf hashes, used both for part-set
//! dissemination proofs and for `Commit::hash` / `Header::tx_hash`.
//!
//! Splits follow the largest-power-of-two-prefix rule (the left subtree's
//! size is always a power of two) so that proofs are well-defined for any
//! number of leaves, not just powers of two.

use serde::{Deserialize, Serialize};

use crate::crypto::Hash;

const LEAF_PREFIX: u8 = 0x00;
const INNER_PREFIX: u8 = 0x01;

fn leaf_hash(content: &Hash) -> Hash {
    Hash::digest_parts(&[&[LEAF_PREFIX], content.as_bytes()])
}

fn inner_hash(left: &Hash, right: &Hash) -> Hash {
    Hash::digest_parts(&[&[INNER_PREFIX], left.as_bytes(), right.as_bytes()])
}

/// Largest power of two strictly less than `n` (`n >= 2`).
fn split_point(n: usize) -> usize {
    debug_assert!(n >= 2);
    let mut k = 1;
    while k * 2 < n {
        k *= 2;
    }
    k
}

fn root_of(items: &[Hash]) -> Hash {
    match items.len() {
        0 => Hash::zero(),
        1 => items[0],
        n => {
            let k = split_point(n);
            let left = root_of(&items[..k]);
            let right = root_of(&items[k..]);
            inner_hash(&left, &right)
        }
    }
}

/// The Merkle root over `leaves`, or the zero hash if `leaves` is empty
/// (the empty-root convention, e.g. for a block with no transactions).
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::zero();
    }
    let hashed: Vec<Hash> = leaves.iter().map(leaf_hash).collect();
    root_of(&hashed)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum Side {
    Left,
    Right,
}

/// An authentication path from one leaf to the tree root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleMerkleProof {
    leaf_index: usize,
    total: usize,
    aunts: Vec<(Hash, Side)>,
}

impl SimpleMerkleProof {
    /// Verifies that `leaf_content` at this proof's index hashes, along the
    /// recorded path, to `root`.
    pub fn verify(&self, root: &Hash, leaf_content: &Hash) -> bool {
        let mut current = leaf_hash(leaf_content);
        for (sibling, side) in &self.aunts {
            current = match side {
                Side::Left => inner_hash(sibling, &current),
                Side::Right => inner_hash(&current, sibling),
            };
        }
        current == *root
    }

    pub fn leaf_index(&self) -> usize {
        self.leaf_index
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

fn build_proof(items: &[Hash], index: usize) -> Vec<(Hash, Side)> {
    if items.len() <= 1 {
        return Vec::new();
    }
    let k = split_point(items.len());
    if index < k {
        let mut proof = build_proof(&items[..k], index);
        proof.push((root_of(&items[k..]), Side::Right));
        proof
    } else {
        let mut proof = build_proof(&items[k..], index - k);
        proof.push((root_of(&items[..k]), Side::Left));
        proof
    }
}

/// Computes the Merkle root over `leaves` together with an authentication
/// proof for every leaf, in index order.
pub fn merkle_root_and_proofs(leaves: &[Hash]) -> (Hash, Vec<SimpleMerkleProof>) {
    if leaves.is_empty() {
        return (Hash::zero(), Vec::new());
    }
    let hashed: Vec<Hash> = leaves.iter().map(leaf_hash).collect();
    let root = root_of(&hashed);
    let total = leaves.len();
    let proofs = (0..total)
        .map(|i| SimpleMerkleProof {
            leaf_index: i,
            total,
            aunts: build_proof(&hashed, i),
        })
        .collect();
    (root, proofs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<Hash> {
        (0..n).map(|i| Hash::digest(&i.to_le_bytes())).collect()
    }

    #[test]
    fn empty_leaves_give_zero_root() {
        assert_eq!(merkle_root(&[]), Hash::zero());
    }

    #[test]
    fn single_leaf_root_is_its_own_leaf_hash() {
        let l = leaves(1);
        let root = merkle_root(&l);
        assert_eq!(root, leaf_hash(&l[0]));
    }

    #[test]
    fn every_leaf_proof_verifies_against_the_root() {
        for n in 1..12 {
            let l = leaves(n);
            let (root, proofs) = merkle_root_and_proofs(&l);
            assert_eq!(proofs.len(), n);
            for (i, proof) in proofs.iter().enumerate() {
                assert!(proof.verify(&root, &l[i]), "leaf {i} of {n} failed to verify");
            }
        }
    }

    #[test]
    fn forged_leaf_content_fails_verification() {
        let l = leaves(4);
        let (root, proofs) = merkle_root_and_proofs(&l);
        let forged = Hash::digest(b"forged");
        assert!(!proofs[2].verify(&root, &forged));
    }

    #[test]
    fn proof_for_wrong_root_fails() {
        let l = leaves(5);
        let (_, proofs) = merkle_root_and_proofs(&l);
        let other_root = merkle_root(&leaves(6));
        assert!(!proofs[0].verify(&other_root, &l[0]));
    }
}
