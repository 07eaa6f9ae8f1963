//! The proposer's signed claim for a `(height, round)`: which block parts
//! to expect, and (if this round is re-proposing a prior POL) which round
//! justifies it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::PartSetHeader;
use crate::crypto::{Address, CanonicalBytes, PublicKey, Signature};

/// `{Height, Round, POLRound, BlockPartsHeader, Signature}`. `pol_round =
/// None` is the wire's `-1`: "no prior valid round justifies this
/// proposal".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub height: u64,
    pub round: u32,
    pub pol_round: Option<u32>,
    pub block_parts_header: PartSetHeader,
    pub proposer_address: Address,
    pub timestamp: DateTime<Utc>,
    pub signature: Signature,
}

impl CanonicalBytes for Proposal {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&self.round.to_be_bytes());
        buf.extend_from_slice(&self.pol_round.map(|r| r as i64).unwrap_or(-1).to_be_bytes());
        buf.extend_from_slice(&self.block_parts_header.total.to_be_bytes());
        buf.extend_from_slice(self.block_parts_header.hash.as_bytes());
        buf.extend_from_slice(self.proposer_address.as_bytes());
        buf.extend_from_slice(&self.timestamp.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
        buf
    }
}

impl Proposal {
    pub fn sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        let mut buf = chain_id.as_bytes().to_vec();
        buf.push(0);
        buf.extend_from_slice(&self.canonical_bytes());
        buf
    }

    pub fn verify(&self, chain_id: &str, proposer_key: &PublicKey) -> bool {
        proposer_key.verify(&self.sign_bytes(chain_id), &self.signature)
    }
}
