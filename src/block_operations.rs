//! `BlockOperations`: the single-threaded adapter between the consensus
//! state machine and the `Application` — collects transactions, assembles
//! proposals, and persists decided blocks.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::application::Application;
use crate::block::{Block, BlockId, Commit, Header, PartSet};
use crate::config::ConsensusConfig;
use crate::crypto::Hash;
use crate::store::{BlockStore, ChainState};
use crate::validators::ValidatorSet;

#[derive(Debug, Error)]
pub enum BlockOperationsError {
    #[error("non-contiguous save: store is at height {current}, tried to save height {attempted}")]
    NonContiguousSave { current: u64, attempted: u64 },
}

/// Read-side state an RPC-style caller can snapshot without touching the
/// consensus worker's in-flight `RoundState`: concurrent readers access it
/// via snapshot methods that acquire a read lock.
struct Inner {
    height: u64,
}

/// Adapts an `Application` and a `BlockStore` for the consensus worker.
/// `height` is guarded by a `tokio::sync::RwLock`; `save_block` takes the
/// write lock, everything else a read lock.
pub struct BlockOperations<A, S> {
    application: Arc<A>,
    store: Arc<S>,
    config: ConsensusConfig,
    inner: RwLock<Inner>,
}

impl<A: Application, S: BlockStore> BlockOperations<A, S> {
    pub fn new(application: Arc<A>, store: Arc<S>, config: ConsensusConfig, starting_height: u64) -> Self {
        Self {
            application,
            store,
            config,
            inner: RwLock::new(Inner { height: starting_height }),
        }
    }

    pub async fn height(&self) -> u64 {
        self.inner.read().await.height
    }

    /// The `Application` this adapts — the reactor needs it directly for
    /// `validate_block`/`commit_block`/`add_evidence`, which don't belong
    /// on this narrower facade.
    pub fn application(&self) -> &Arc<A> {
        &self.application
    }

    pub async fn chain_state(&self) -> Option<ChainState> {
        self.store.load_state().await
    }

    /// Pulls pending transactions, de-duplicated and gas-capped, from the
    /// `Application`.
    pub async fn collect_transactions(&self) -> Vec<Vec<u8>> {
        let mut seen = std::collections::HashSet::new();
        self.application
            .collect_transactions(self.config.max_block_gas)
            .await
            .into_iter()
            .filter(|tx| seen.insert(Hash::digest(tx)))
            .take(self.config.max_block_txs)
            .collect()
    }

    /// Fills header fields and computes `tx_hash`; returns an unsigned
    /// block ready to be split into parts and proposed.
    pub fn create_block(
        &self,
        height: u64,
        coinbase: crate::crypto::Address,
        last_block_id: BlockId,
        last_commit: Option<Commit>,
        validators_hash: Hash,
        txs: Vec<Vec<u8>>,
    ) -> Block {
        let last_commit_hash = last_commit
            .as_ref()
            .map(|c| c.hash(&self.config.chain_id))
            .unwrap_or_else(Hash::zero);
        let header = Header {
            height,
            time: Utc::now(),
            num_txs: txs.len() as u64,
            gas_limit: self.config.max_block_gas,
            gas_used: 0,
            last_block_id,
            coinbase,
            last_commit_hash,
            tx_hash: Block::compute_tx_hash(&txs),
            root: Hash::zero(),
            receipt_hash: Hash::zero(),
            bloom: Vec::new(),
            validators_hash,
            consensus_hash: Hash::zero(),
        };
        Block { header, transactions: txs, last_commit }
    }

    /// Splits a block's serialized form into parts for gossip.
    pub fn make_part_set(&self, block: &Block) -> PartSet {
        let bytes = serde_json::to_vec(block).expect("Block serialization cannot fail");
        PartSet::from_data(&bytes, self.config.part_size_bytes)
    }

    /// Persists a decided block along with its part-set and seen-commit.
    /// `block.height` must be exactly `current height + 1`; any other
    /// value is the `Contractual` class of error: a programmer bug,
    /// not a recoverable condition.
    pub async fn save_block(
        &self,
        block: Block,
        parts: PartSet,
        seen_commit: Commit,
        validators: ValidatorSet,
    ) -> Result<(), BlockOperationsError> {
        let mut inner = self.inner.write().await;
        let expected = inner.height + 1;
        if block.header.height != expected {
            return Err(BlockOperationsError::NonContiguousSave {
                current: inner.height,
                attempted: block.header.height,
            });
        }
        let new_height = block.header.height;
        let block_id = BlockId { hash: block.header.hash(), part_set_header: parts.header() };
        let last_validators = validators.clone();
        self.store.save_block(block, parts, seen_commit).await;
        self.store
            .save_state(ChainState {
                last_block_height: new_height,
                last_block_id: block_id,
                last_block_time: Utc::now(),
                validators: validators.clone(),
                last_validators,
                last_height_validators_changed: new_height,
            })
            .await;
        inner.height = new_height;
        tracing::info!(height = new_height, "block committed and persisted");
        Ok(())
    }

    pub async fn load_block(&self, height: u64) -> Option<Block> {
        self.store.load_block(height).await
    }

    pub async fn load_commit(&self, height: u64) -> Option<Commit> {
        self.store.load_commit(height).await
    }

    pub async fn load_seen_commit(&self, height: u64) -> Option<Commit> {
        self.store.load_seen_commit(height).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Address;
    use crate::evidence::Evidence;
    use crate::store::MemoryBlockStore;
    use async_trait::async_trait;

    struct StubApplication {
        txs: Vec<Vec<u8>>,
    }

    #[async_trait]
    impl Application for StubApplication {
        async fn collect_transactions(&self, _max_gas: u64) -> Vec<Vec<u8>> {
            self.txs.clone()
        }

        async fn validate_block(
            &self,
            _block: &Block,
            _last_commit: Option<&Commit>,
        ) -> Result<(), crate::application::ValidationError> {
            Ok(())
        }

        async fn commit_block(
            &self,
            _block: &Block,
            _seen_commit: &Commit,
        ) -> Result<Hash, crate::application::CommitError> {
            Ok(Hash::zero())
        }

        async fn add_evidence(&self, _evidence: Evidence) {}
    }

    fn ops(txs: Vec<Vec<u8>>) -> BlockOperations<StubApplication, MemoryBlockStore> {
        BlockOperations::new(
            Arc::new(StubApplication { txs }),
            Arc::new(MemoryBlockStore::new()),
            ConsensusConfig::default(),
            0,
        )
    }

    #[tokio::test]
    async fn collect_transactions_deduplicates_by_hash() {
        let ops = ops(vec![b"tx-a".to_vec(), b"tx-a".to_vec(), b"tx-b".to_vec()]);
        let collected = ops.collect_transactions().await;
        assert_eq!(collected.len(), 2);
    }

    #[tokio::test]
    async fn save_block_rejects_non_contiguous_height() {
        let ops = ops(vec![]);
        let block = ops.create_block(5, Address::zero(), BlockId::zero(), None, Hash::zero(), vec![]);
        let parts = ops.make_part_set(&block);
        let commit = Commit { height: 5, round: 0, block_id: BlockId::zero(), precommits: vec![] };
        let validators = ValidatorSet::new(vec![crate::validators::Validator::new(
            crate::crypto::Keypair::generate().public_key().clone(),
            100,
        )])
        .unwrap();
        let err = ops.save_block(block, parts, commit, validators).await.unwrap_err();
        assert!(matches!(err, BlockOperationsError::NonContiguousSave { current: 0, attempted: 5 }));
    }

    #[tokio::test]
    async fn save_block_advances_height_by_one() {
        let ops = ops(vec![]);
        let block = ops.create_block(1, Address::zero(), BlockId::zero(), None, Hash::zero(), vec![]);
        let parts = ops.make_part_set(&block);
        let commit = Commit { height: 1, round: 0, block_id: BlockId::zero(), precommits: vec![] };
        let validators = ValidatorSet::new(vec![crate::validators::Validator::new(
            crate::crypto::Keypair::generate().public_key().clone(),
            100,
        )])
        .unwrap();
        ops.save_block(block, parts, commit, validators).await.unwrap();
        assert_eq!(ops.height().await, 1);
    }
}
