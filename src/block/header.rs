//! Block header and its canonical, deterministic hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{Address, CanonicalBytes, Hash};

use super::block_id::BlockId;

/// Block header. `Header::hash()` is the block's identity (`BlockID.Hash`);
/// `Bloom`, `Root` and `ReceiptHash` are opaque bytes the `Application`
/// fills in from its own execution layer — the core never interprets them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub height: u64,
    pub time: DateTime<Utc>,
    pub num_txs: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub last_block_id: BlockId,
    pub coinbase: Address,
    pub last_commit_hash: Hash,
    pub tx_hash: Hash,
    pub root: Hash,
    pub receipt_hash: Hash,
    pub bloom: Vec<u8>,
    pub validators_hash: Hash,
    pub consensus_hash: Hash,
}

impl CanonicalBytes for Header {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&self.time.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
        buf.extend_from_slice(&self.num_txs.to_be_bytes());
        buf.extend_from_slice(&self.gas_limit.to_be_bytes());
        buf.extend_from_slice(&self.gas_used.to_be_bytes());
        buf.extend_from_slice(self.last_block_id.hash.as_bytes());
        buf.extend_from_slice(&self.last_block_id.part_set_header.total.to_be_bytes());
        buf.extend_from_slice(self.last_block_id.part_set_header.hash.as_bytes());
        buf.extend_from_slice(self.coinbase.as_bytes());
        buf.extend_from_slice(self.last_commit_hash.as_bytes());
        buf.extend_from_slice(self.tx_hash.as_bytes());
        buf.extend_from_slice(self.root.as_bytes());
        buf.extend_from_slice(self.receipt_hash.as_bytes());
        buf.extend_from_slice(&self.bloom);
        buf.extend_from_slice(self.validators_hash.as_bytes());
        buf.extend_from_slice(self.consensus_hash.as_bytes());
        buf
    }
}

impl Header {
    /// `keccak256` of the canonical serialization; this is the block hash
    /// carried in `BlockID.Hash`.
    pub fn hash(&self) -> Hash {
        Hash::digest(&self.canonical_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            height: 1,
            time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            num_txs: 0,
            gas_limit: 10_000_000,
            gas_used: 0,
            last_block_id: BlockId::zero(),
            coinbase: Address::zero(),
            last_commit_hash: Hash::zero(),
            tx_hash: Hash::zero(),
            root: Hash::zero(),
            receipt_hash: Hash::zero(),
            bloom: vec![0u8; 256],
            validators_hash: Hash::digest(b"validators"),
            consensus_hash: Hash::digest(b"consensus"),
        }
    }

    #[test]
    fn hash_is_deterministic_across_identical_headers() {
        let a = sample_header();
        let b = sample_header();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn hash_changes_when_a_field_changes() {
        let a = sample_header();
        let mut b = sample_header();
        b.gas_used = 1;
        assert_ne!(a.hash(), b.hash());
    }
}
