//! `Block`: header plus transactions plus the commit for the previous
//! block, immutable once constructed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::commit::Commit;
use super::header::Header;
use super::merkle::merkle_root;
use crate::crypto::Hash;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("header.num_txs ({header}) does not match transactions.len() ({actual})")]
    NumTxsMismatch { header: u64, actual: usize },
    #[error("height 1 must have no last_commit and a zero last_commit_hash")]
    GenesisMustHaveNoLastCommit,
    #[error("header.last_commit_hash does not match last_commit.hash()")]
    LastCommitHashMismatch,
    #[error("last_commit failed validate_basic: {0}")]
    InvalidLastCommit(#[from] super::commit::CommitError),
    #[error("height > 1 must carry a last_commit")]
    MissingLastCommit,
}

/// Transactions are kept as opaque, Application-defined byte strings: the
/// core never interprets transaction contents, only orders and hashes
/// them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Vec<u8>>,
    pub last_commit: Option<Commit>,
}

impl Block {
    /// `Merkle(transactions)`, or the empty root if there are none — the
    /// value `Header::tx_hash` must carry.
    pub fn compute_tx_hash(transactions: &[Vec<u8>]) -> Hash {
        let leaves: Vec<Hash> = transactions.iter().map(|tx| Hash::digest(tx)).collect();
        merkle_root(&leaves)
    }

    /// Internal-consistency checks independent of any `ValidatorSet` or
    /// `Application`: `num_txs`/`tx_hash` bookkeeping and the
    /// `last_commit`/`last_commit_hash` relationship for height > 1.
    pub fn validate_basic(&self, chain_id: &str) -> Result<(), BlockError> {
        if self.header.num_txs != self.transactions.len() as u64 {
            return Err(BlockError::NumTxsMismatch {
                header: self.header.num_txs,
                actual: self.transactions.len(),
            });
        }
        if self.header.height == 1 {
            if self.last_commit.is_some() || !self.header.last_commit_hash.is_zero() {
                return Err(BlockError::GenesisMustHaveNoLastCommit);
            }
            return Ok(());
        }
        let Some(last_commit) = &self.last_commit else {
            return Err(BlockError::MissingLastCommit);
        };
        last_commit.validate_basic()?;
        if last_commit.hash(chain_id) != self.header.last_commit_hash {
            return Err(BlockError::LastCommitHashMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::block_id::BlockId;
    use crate::crypto::Address;
    use chrono::{DateTime, Utc};

    fn genesis_block() -> Block {
        let header = Header {
            height: 1,
            time: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            num_txs: 0,
            gas_limit: 10_000_000,
            gas_used: 0,
            last_block_id: BlockId::zero(),
            coinbase: Address::zero(),
            last_commit_hash: Hash::zero(),
            tx_hash: Hash::zero(),
            root: Hash::zero(),
            receipt_hash: Hash::zero(),
            bloom: vec![],
            validators_hash: Hash::digest(b"validators"),
            consensus_hash: Hash::digest(b"consensus"),
        };
        Block { header, transactions: vec![], last_commit: None }
    }

    #[test]
    fn genesis_block_validates() {
        assert!(genesis_block().validate_basic("chain").is_ok());
    }

    #[test]
    fn num_txs_mismatch_is_rejected() {
        let mut block = genesis_block();
        block.header.num_txs = 1;
        assert_eq!(
            block.validate_basic("chain").unwrap_err(),
            BlockError::NumTxsMismatch { header: 1, actual: 0 }
        );
    }

    #[test]
    fn height_above_one_requires_a_last_commit() {
        let mut block = genesis_block();
        block.header.height = 2;
        assert_eq!(
            block.validate_basic("chain").unwrap_err(),
            BlockError::MissingLastCommit
        );
    }

    #[test]
    fn tx_hash_of_no_transactions_is_the_empty_root() {
        assert_eq!(Block::compute_tx_hash(&[]), Hash::zero());
    }
}
