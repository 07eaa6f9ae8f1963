//! Per-`(ChainID, Height, Round, Type)` vote accumulator: tallies voting
//! power per `BlockID`, detects +2/3 majorities and double-vote conflicts.

use std::collections::HashMap;

use thiserror::Error;

use crate::block::BlockId;
use crate::crypto::Hash;
use crate::evidence::DuplicateVoteEvidence;
use crate::validators::ValidatorSet;

use super::vote::{Vote, VoteType};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteSetError {
    #[error("vote height {actual} does not match vote set height {expected}")]
    WrongHeight { expected: u64, actual: u64 },
    #[error("vote round {actual} does not match vote set round {expected}")]
    WrongRound { expected: u32, actual: u32 },
    #[error("vote type does not match this vote set's type")]
    WrongType,
    #[error("validator index {0} is out of range")]
    IndexOutOfRange(usize),
    #[error("validator address does not match the index's validator")]
    AddressMismatch,
    #[error("vote signature does not verify")]
    BadSignature,
}

/// What happened when a vote was submitted.
#[derive(Debug, PartialEq)]
pub enum AddVoteOutcome {
    /// Accepted and tallied.
    Added,
    /// Same validator, same `BlockId` as an existing vote: ignored.
    Duplicate,
    /// Same validator, a different non-nil `BlockId`: evidence recorded,
    /// tally left untouched.
    Conflicting(DuplicateVoteEvidence),
}

#[derive(Default)]
struct BlockTally {
    power: i64,
    voters: Vec<usize>,
}

pub struct VoteSet {
    chain_id: String,
    height: u64,
    round: u32,
    vote_type: VoteType,
    validators: ValidatorSet,
    votes: Vec<Option<Vote>>,
    votes_by_block: HashMap<Hash, BlockTally>,
    maj23: Option<BlockId>,
    peer_maj23s: HashMap<String, BlockId>,
}

impl VoteSet {
    pub fn new(chain_id: String, height: u64, round: u32, vote_type: VoteType, validators: ValidatorSet) -> Self {
        let size = validators.len();
        Self {
            chain_id,
            height,
            round,
            vote_type,
            validators,
            votes: vec![None; size],
            votes_by_block: HashMap::new(),
            maj23: None,
            peer_maj23s: HashMap::new(),
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn vote_type(&self) -> VoteType {
        self.vote_type
    }

    pub fn maj23(&self) -> Option<BlockId> {
        self.maj23
    }

    pub fn get_by_index(&self, index: usize) -> Option<&Vote> {
        self.votes.get(index).and_then(|v| v.as_ref())
    }

    /// All slots in validator-index order, `None` where that validator
    /// hasn't voted — the shape `Commit::precommits` needs directly.
    pub fn votes(&self) -> &[Option<Vote>] {
        &self.votes
    }

    /// Sum of voting power for `block_id`, or 0 if nothing has been tallied
    /// for it.
    pub fn voting_power_for(&self, block_id: &BlockId) -> i64 {
        self.votes_by_block
            .get(&block_id.key())
            .map(|t| t.power)
            .unwrap_or(0)
    }

    pub fn has_two_thirds_any(&self) -> bool {
        self.maj23.is_some()
    }

    /// Sum of voting power across every accepted vote, regardless of which
    /// `BlockId` it targeted. Always `<= validators.total_voting_power()`.
    pub fn total_voted_power(&self) -> i64 {
        self.votes_by_block.values().map(|t| t.power).sum()
    }

    /// Validates the vote against this round/type/validator set, then
    /// records it and checks for a fresh +2/3 majority.
    pub fn add_vote(&mut self, vote: Vote) -> Result<AddVoteOutcome, VoteSetError> {
        if vote.height != self.height {
            return Err(VoteSetError::WrongHeight { expected: self.height, actual: vote.height });
        }
        if vote.round != self.round {
            return Err(VoteSetError::WrongRound { expected: self.round, actual: vote.round });
        }
        if vote.vote_type != self.vote_type {
            return Err(VoteSetError::WrongType);
        }
        let Some(validator) = self.validators.get_by_index(vote.validator_index) else {
            return Err(VoteSetError::IndexOutOfRange(vote.validator_index));
        };
        if validator.address() != vote.validator_address {
            return Err(VoteSetError::AddressMismatch);
        }
        if !vote.verify(&self.chain_id, &self.validators) {
            return Err(VoteSetError::BadSignature);
        }

        if let Some(existing) = self.votes[vote.validator_index].clone() {
            if existing.block_id.key() == vote.block_id.key() {
                return Ok(AddVoteOutcome::Duplicate);
            }
            // Any other non-duplicate vote from the same validator at the
            // same (height, round, type) is a conflict, whether or not the
            // first vote was nil; the tally already reflects the first
            // vote and must not be touched.
            let evidence = DuplicateVoteEvidence::new(existing, vote);
            return Ok(AddVoteOutcome::Conflicting(evidence));
        }

        self.record_vote(vote);
        Ok(AddVoteOutcome::Added)
    }

    fn record_vote(&mut self, vote: Vote) {
        let index = vote.validator_index;
        let power = self
            .validators
            .get_by_index(index)
            .map(|v| v.voting_power())
            .unwrap_or(0);
        let key = vote.block_id.key();
        let block_id = vote.block_id;
        self.votes[index] = Some(vote);

        let tally = self.votes_by_block.entry(key).or_default();
        tally.power += power;
        tally.voters.push(index);

        if self.maj23.is_none() && tally.power >= self.validators.two_thirds_threshold() {
            self.maj23 = Some(block_id);
        }
    }

    /// Records a peer's claimed +2/3 target. A peer may set this at most
    /// once; later claims are ignored. Returns whether it was recorded.
    pub fn set_peer_maj23(&mut self, peer_id: String, block_id: BlockId) -> bool {
        if self.peer_maj23s.contains_key(&peer_id) {
            return false;
        }
        self.peer_maj23s.insert(peer_id, block_id);
        true
    }

    pub fn peer_maj23(&self, peer_id: &str) -> Option<BlockId> {
        self.peer_maj23s.get(peer_id).copied()
    }
}
