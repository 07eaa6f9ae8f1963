//! `BlockID` and `PartSetHeader`: the compact identifiers carried in votes,
//! proposals and the wire `NewRoundStep`/`CommitStep` messages.

use serde::{Deserialize, Serialize};

use crate::crypto::Hash;

/// `{Total, Hash}` describing a part-set without the parts themselves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct PartSetHeader {
    pub total: u32,
    pub hash: Hash,
}

impl PartSetHeader {
    pub fn zero() -> Self {
        Self {
            total: 0,
            hash: Hash::zero(),
        }
    }
}

/// `{Hash, PartsHeader}`. Two `BlockId`s are considered the same block iff
/// their `hash` matches — `part_set_header` is auxiliary reassembly data,
/// so `key()` (used to index `VoteSet::votes_by_block`) intentionally
/// returns only the hash.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct BlockId {
    pub hash: Hash,
    pub part_set_header: PartSetHeader,
}

impl BlockId {
    pub fn zero() -> Self {
        Self {
            hash: Hash::zero(),
            part_set_header: PartSetHeader::zero(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.hash.is_zero()
    }

    pub fn key(&self) -> Hash {
        self.hash
    }
}
