//! Byzantine evidence: proof that a validator double-signed. Captured for
//! the `Application` to act on; the core itself never slashes.

use serde::{Deserialize, Serialize};

use crate::crypto::Address;
use crate::vote::Vote;

/// A validator signed two different, non-nil `BlockId`s at the same
/// `(height, round, type)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DuplicateVoteEvidence {
    pub validator_address: Address,
    pub vote_a: Vote,
    pub vote_b: Vote,
}

impl DuplicateVoteEvidence {
    pub fn new(vote_a: Vote, vote_b: Vote) -> Self {
        Self {
            validator_address: vote_a.validator_address,
            vote_a,
            vote_b,
        }
    }
}

/// A proposer signed two distinct proposals for the same `(height, round)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquivocatingProposalEvidence {
    pub proposer_address: Address,
    pub height: u64,
    pub round: u32,
    pub block_hash_a: crate::crypto::Hash,
    pub block_hash_b: crate::crypto::Hash,
}

/// The kinds of misbehavior the core can detect and surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Evidence {
    DuplicateVote(DuplicateVoteEvidence),
    EquivocatingProposal(EquivocatingProposalEvidence),
}
