//! A single signed pre-vote or pre-commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::BlockId;
use crate::crypto::{Address, CanonicalBytes, PublicKey, Signature};
use crate::validators::ValidatorSet;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteType {
    Prevote,
    Precommit,
}

/// `{ValidatorAddress, ValidatorIndex, Height, Round, Timestamp, Type,
/// BlockID, Signature}`. `block_id.is_zero()` marks an explicit nil vote
/// (abstention for this block).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub validator_address: Address,
    pub validator_index: usize,
    pub height: u64,
    pub round: u32,
    pub timestamp: DateTime<Utc>,
    pub vote_type: VoteType,
    pub block_id: BlockId,
    pub signature: Signature,
}

impl Vote {
    /// Canonical bytes to sign/verify: every field but `signature`,
    /// prefixed with the chain identifier so a vote cannot be replayed
    /// across chains.
    pub fn sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(chain_id.as_bytes());
        buf.push(0); // separator: chain ids are not length-prefixed elsewhere
        buf.extend_from_slice(self.validator_address.as_bytes());
        buf.extend_from_slice(&(self.validator_index as u64).to_be_bytes());
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&self.round.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
        buf.push(match self.vote_type {
            VoteType::Prevote => 0x01,
            VoteType::Precommit => 0x02,
        });
        buf.extend_from_slice(self.block_id.hash.as_bytes());
        buf.extend_from_slice(&self.block_id.part_set_header.total.to_be_bytes());
        buf.extend_from_slice(self.block_id.part_set_header.hash.as_bytes());
        buf
    }

    pub fn is_nil(&self) -> bool {
        self.block_id.is_zero()
    }

    /// Checks the vote's index and address against `validators` and its
    /// signature against the resolved public key. Does not check
    /// height/round/type against any `VoteSet` — that is `VoteSet::add_vote`'s
    /// job.
    pub fn verify(&self, chain_id: &str, validators: &ValidatorSet) -> bool {
        let Some(validator) = validators.get_by_index(self.validator_index) else {
            return false;
        };
        if validator.address() != self.validator_address {
            return false;
        }
        self.verify_signature(chain_id, validator.pub_key())
    }

    fn verify_signature(&self, chain_id: &str, pub_key: &PublicKey) -> bool {
        pub_key.verify(&self.sign_bytes(chain_id), &self.signature)
    }
}

impl CanonicalBytes for Vote {
    fn canonical_bytes(&self) -> Vec<u8> {
        self.sign_bytes("")
    }
}
