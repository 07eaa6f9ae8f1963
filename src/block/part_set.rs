//! Chunked block dissemination: splitting a serialized block into
//! fixed-size, Merkle-authenticated parts, and reassembling it from parts
//! that may arrive in any order.

use serde::{Deserialize, Serialize};

use crate::crypto::Hash;

use super::block_id::PartSetHeader;
use super::merkle::{merkle_root_and_proofs, SimpleMerkleProof};

/// Recommended chunk size: 64 KiB.
pub const DEFAULT_PART_SIZE_BYTES: usize = 64 * 1024;

/// `{Index, Bytes, Proof}`. `Part::hash()` is `keccak256(bytes)` — the leaf
/// value authenticated by `Proof` against the owning `PartSet::hash`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub index: u32,
    pub bytes: Vec<u8>,
    pub proof: SimpleMerkleProof,
}

impl Part {
    pub fn hash(&self) -> Hash {
        Hash::digest(&self.bytes)
    }
}

/// A block split into (or being reassembled from) fixed-size parts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartSet {
    total: u32,
    hash: Hash,
    parts: Vec<Option<Part>>,
    count: u32,
}

impl PartSet {
    /// Splits `data` into `part_size`-byte chunks and builds a fully
    /// populated `PartSet` with its Merkle root and a proof per part.
    pub fn from_data(data: &[u8], part_size: usize) -> Self {
        let chunks: Vec<&[u8]> = if data.is_empty() {
            vec![&data[..0]]
        } else {
            data.chunks(part_size).collect()
        };
        let leaves: Vec<Hash> = chunks.iter().map(|c| Hash::digest(c)).collect();
        let (root, proofs) = merkle_root_and_proofs(&leaves);
        let total = chunks.len() as u32;
        let parts = chunks
            .into_iter()
            .zip(proofs)
            .enumerate()
            .map(|(i, (bytes, proof))| {
                Some(Part {
                    index: i as u32,
                    bytes: bytes.to_vec(),
                    proof,
                })
            })
            .collect();
        Self {
            total,
            hash: root,
            parts,
            count: total,
        }
    }

    /// An empty shell sized from a `PartSetHeader` received in a Proposal,
    /// to be filled in as parts arrive over the wire.
    pub fn new_from_header(header: PartSetHeader) -> Self {
        Self {
            total: header.total,
            hash: header.hash,
            parts: vec![None; header.total as usize],
            count: 0,
        }
    }

    pub fn header(&self) -> PartSetHeader {
        PartSetHeader {
            total: self.total,
            hash: self.hash,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_complete(&self) -> bool {
        self.count == self.total
    }

    pub fn get_part(&self, index: u32) -> Option<&Part> {
        self.parts.get(index as usize).and_then(|p| p.as_ref())
    }

    /// Accepts `part` iff its index is in range, the slot is empty, and its
    /// Merkle proof verifies against `self.hash` (first-write-wins per
    /// index). Returns whether it was accepted; a rejection is never an
    /// error the caller must surface, only counted.
    pub fn add_part(&mut self, part: Part) -> bool {
        let Some(slot) = self.parts.get_mut(part.index as usize) else {
            return false;
        };
        if slot.is_some() {
            return false;
        }
        if !part.proof.verify(&self.hash, &part.hash()) {
            return false;
        }
        *slot = Some(part);
        self.count += 1;
        true
    }

    /// Concatenates all parts' bytes in index order. Only meaningful once
    /// `is_complete()`.
    pub fn assemble(&self) -> Option<Vec<u8>> {
        if !self.is_complete() {
            return None;
        }
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(&part.as_ref().expect("complete PartSet has no empty slots").bytes);
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_under_arbitrary_part_order() {
        let data = vec![7u8; 200 * 1024];
        let full = PartSet::from_data(&data, DEFAULT_PART_SIZE_BYTES);
        assert_eq!(full.total(), 4);

        let mut receiving = PartSet::new_from_header(full.header());
        for index in [3, 1, 0, 2] {
            assert!(!receiving.is_complete());
            let part = full.get_part(index).unwrap().clone();
            assert!(receiving.add_part(part));
        }
        assert!(receiving.is_complete());
        assert_eq!(receiving.assemble().unwrap(), data);
    }

    #[test]
    fn rejects_a_part_once_the_set_is_complete() {
        let data = vec![1u8; 10];
        let full = PartSet::from_data(&data, 4);
        let mut receiving = PartSet::new_from_header(full.header());
        for i in 0..full.total() {
            receiving.add_part(full.get_part(i).unwrap().clone());
        }
        assert!(receiving.is_complete());
        let extra = full.get_part(0).unwrap().clone();
        assert!(!receiving.add_part(extra));
    }

    #[test]
    fn rejects_forged_bytes_with_a_valid_index_but_wrong_content() {
        let data = vec![9u8; 10];
        let full = PartSet::from_data(&data, 4);
        let mut receiving = PartSet::new_from_header(full.header());
        let mut forged = full.get_part(0).unwrap().clone();
        forged.bytes = vec![0xff; forged.bytes.len()];
        assert!(!receiving.add_part(forged));
        assert_eq!(receiving.count(), 0);
    }

    #[test]
    fn rejects_out_of_range_index() {
        let full = PartSet::from_data(&[1, 2, 3], 4);
        let mut receiving = PartSet::new_from_header(full.header());
        let mut bogus = full.get_part(0).unwrap().clone();
        bogus.index = 99;
        assert!(!receiving.add_part(bogus));
    }

    #[test]
    fn empty_data_yields_a_single_empty_part() {
        let full = PartSet::from_data(&[], DEFAULT_PART_SIZE_BYTES);
        assert_eq!(full.total(), 1);
        assert_eq!(full.assemble().unwrap(), Vec::<u8>::new());
    }
}
