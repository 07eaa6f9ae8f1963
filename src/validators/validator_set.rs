//! Ordered, sorted set of validators with cached total voting power and a
//! deterministic round-robin proposer rule.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::Address;

use super::Validator;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidatorSetError {
    #[error("validator set must contain at least one validator")]
    Empty,
    #[error("duplicate validator address {0}")]
    DuplicateAddress(Address),
}

/// The ordered validator set: validators sorted ascending by address,
/// with a cached total voting power and the index of the current
/// proposer.
///
/// Either round-robin or weighted-accumulator proposer selection works
/// as long as it's deterministic; this implementation sticks to
/// round-robin by sorted index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
    total_voting_power: i64,
    proposer_index: usize,
}

impl ValidatorSet {
    /// Builds a set from an unsorted validator list, sorting by address and
    /// rejecting duplicates. The proposer starts at index 0.
    pub fn new(mut validators: Vec<Validator>) -> Result<Self, ValidatorSetError> {
        if validators.is_empty() {
            return Err(ValidatorSetError::Empty);
        }
        validators.sort_by_key(|v| v.address());
        for window in validators.windows(2) {
            if window[0].address() == window[1].address() {
                return Err(ValidatorSetError::DuplicateAddress(window[0].address()));
            }
        }
        let total_voting_power = validators.iter().map(|v| v.voting_power()).sum();
        Ok(Self {
            validators,
            total_voting_power,
            proposer_index: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn has_address(&self, address: &Address) -> bool {
        self.index_of(address).is_some()
    }

    fn index_of(&self, address: &Address) -> Option<usize> {
        self.validators
            .binary_search_by_key(address, |v| v.address())
            .ok()
    }

    /// Binary search by address. O(log N).
    pub fn get_by_address(&self, address: &Address) -> Option<(usize, &Validator)> {
        let index = self.index_of(address)?;
        Some((index, &self.validators[index]))
    }

    /// O(1); out-of-range returns `None` rather than a sentinel address.
    pub fn get_by_index(&self, index: usize) -> Option<&Validator> {
        self.validators.get(index)
    }

    /// Cached at construction time; `IncrementAccum` never changes
    /// membership so the cache never goes stale.
    pub fn total_voting_power(&self) -> i64 {
        self.total_voting_power
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// The validator designated to propose at the current round.
    pub fn get_proposer(&self) -> &Validator {
        &self.validators[self.proposer_index]
    }

    /// Advances the proposer `times` steps in sorted-address order. Called
    /// once per round by the consensus worker on entering `NewRound`.
    pub fn increment_accum(&mut self, times: u64) {
        let len = self.validators.len() as u64;
        self.proposer_index = ((self.proposer_index as u64 + times) % len) as usize;
    }

    /// The minimum voting power that counts as a +2/3 super-majority of
    /// this set's total.
    pub fn two_thirds_threshold(&self) -> i64 {
        (self.total_voting_power * 2) / 3 + 1
    }

    /// A content hash of the membership, carried in `Header::validators_hash`
    /// so a header commits to exactly which set produced it.
    pub fn hash(&self) -> crate::crypto::Hash {
        let leaves: Vec<crate::crypto::Hash> = self
            .validators
            .iter()
            .map(|v| {
                let mut buf = Vec::new();
                buf.extend_from_slice(v.address().as_bytes());
                buf.extend_from_slice(&v.pub_key().to_sec1_bytes());
                buf.extend_from_slice(&v.voting_power().to_be_bytes());
                crate::crypto::Hash::digest(&buf)
            })
            .collect();
        crate::block::merkle_root(&leaves)
    }
}
