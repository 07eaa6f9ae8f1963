//! Keccak-256 hashing and the 32-byte `Hash` newtype used throughout the
//! data model for block, header, commit and part-set digests.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// A 32-byte Keccak-256 digest.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const LENGTH: usize = 32;

    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::LENGTH {
            return None;
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Some(Self(out))
    }

    /// Hash of `data` with Keccak-256.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(data);
        let out = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&out);
        Self(bytes)
    }

    /// Hash of the concatenation of several byte slices, without an
    /// intermediate allocation, matching how canonical signable/hashable
    /// structures concatenate their fields before hashing.
    pub fn digest_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Keccak256::new();
        for part in parts {
            hasher.update(part);
        }
        let out = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&out);
        Self(bytes)
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = Hash::digest(b"kardia");
        let b = Hash::digest(b"kardia");
        assert_eq!(a, b);
    }

    #[test]
    fn digest_parts_matches_concatenation() {
        let concatenated = Hash::digest(b"helloworld");
        let parts = Hash::digest_parts(&[b"hello", b"world"]);
        assert_eq!(concatenated, parts);
    }

    #[test]
    fn zero_hash_is_zero() {
        assert!(Hash::zero().is_zero());
        assert!(!Hash::digest(b"x").is_zero());
    }
}
