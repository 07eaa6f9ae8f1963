//! `Commit`: the ordered set of precommit votes that finalizes a block at
//! one height, and `ValidatorSet::verify_commit`, which checks that a
//! commit actually carries a +2/3 super-majority.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::Hash;
use crate::validators::ValidatorSet;
use crate::vote::{Vote, VoteType};

use super::block_id::BlockId;
use super::merkle::merkle_root;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitError {
    #[error("commit has {actual} slots, expected {expected} (validator set size)")]
    WrongSlotCount { expected: usize, actual: usize },
    #[error("slot {index} has the wrong height: expected {expected}, got {actual}")]
    WrongHeight { index: usize, expected: u64, actual: u64 },
    #[error("slot {index} has the wrong vote type")]
    WrongVoteType { index: usize },
    #[error("slot {index} does not match the commit's block id")]
    BlockIdMismatch { index: usize },
    #[error("slot {index}'s signature does not verify")]
    BadSignature { index: usize },
    #[error("tallied voting power does not reach the two-thirds threshold")]
    InsufficientVotingPower,
}

/// Slot `i` belongs to the validator at `ValidatorSet` index `i`; `None`
/// means that validator did not precommit — an absent vote, distinct
/// from a vote cast for nil.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub height: u64,
    pub round: u32,
    pub block_id: BlockId,
    pub precommits: Vec<Option<Vote>>,
}

impl Commit {
    pub fn validate_basic(&self) -> Result<(), CommitError> {
        for (index, slot) in self.precommits.iter().enumerate() {
            let Some(vote) = slot else { continue };
            if vote.vote_type != VoteType::Precommit {
                return Err(CommitError::WrongVoteType { index });
            }
            if vote.height != self.height {
                return Err(CommitError::WrongHeight {
                    index,
                    expected: self.height,
                    actual: vote.height,
                });
            }
            if vote.block_id != self.block_id {
                return Err(CommitError::BlockIdMismatch { index });
            }
        }
        Ok(())
    }

    /// `Merkle([v.sign_bytes(chain_id) for v in precommits])`, with absent
    /// slots contributing the hash of an empty byte string.
    pub fn hash(&self, chain_id: &str) -> Hash {
        let leaves: Vec<Hash> = self
            .precommits
            .iter()
            .map(|slot| match slot {
                Some(vote) => Hash::digest(&vote.sign_bytes(chain_id)),
                None => Hash::digest(&[]),
            })
            .collect();
        merkle_root(&leaves)
    }

    pub fn voting_power_for(&self, validators: &ValidatorSet, block_id: &BlockId) -> i64 {
        self.precommits
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let vote = slot.as_ref()?;
                if vote.is_nil() || vote.block_id.key() != block_id.key() {
                    return None;
                }
                validators.get_by_index(index).map(|v| v.voting_power())
            })
            .sum()
    }
}

impl ValidatorSet {
    /// Checks that `commit` is a valid +2/3 precommit set for `block_id` at
    /// `height`, signed by members of this validator set.
    pub fn verify_commit(
        &self,
        chain_id: &str,
        block_id: &BlockId,
        height: u64,
        commit: &Commit,
    ) -> Result<(), CommitError> {
        if commit.precommits.len() != self.len() {
            return Err(CommitError::WrongSlotCount {
                expected: self.len(),
                actual: commit.precommits.len(),
            });
        }
        let mut tallied = 0i64;
        for (index, slot) in commit.precommits.iter().enumerate() {
            let Some(vote) = slot else { continue };
            if vote.height != height {
                return Err(CommitError::WrongHeight {
                    index,
                    expected: height,
                    actual: vote.height,
                });
            }
            if vote.vote_type != VoteType::Precommit {
                return Err(CommitError::WrongVoteType { index });
            }
            if !vote.verify(chain_id, self) {
                return Err(CommitError::BadSignature { index });
            }
            if !vote.is_nil() && vote.block_id.key() == block_id.key() {
                tallied += self
                    .get_by_index(index)
                    .map(|v| v.voting_power())
                    .unwrap_or(0);
            }
        }
        if tallied < self.two_thirds_threshold() {
            return Err(CommitError::InsufficientVotingPower);
        }
        Ok(())
    }
}
