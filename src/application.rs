//! The `Application` boundary: everything the consensus core needs from
//! block execution, the mempool, and evidence handling, without knowing
//! anything about their internals.

use async_trait::async_trait;
use thiserror::Error;

use crate::block::{Block, Commit};
use crate::crypto::Hash;
use crate::evidence::Evidence;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("block failed application-level validation: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("application could not commit the block: {0}")]
    Failed(String),
}

/// Implemented by the node's execution/storage layer. The core calls this
/// to pull pending work and to hand off decided blocks; it never reaches
/// into transaction pool, account state, or storage internals directly.
#[async_trait]
pub trait Application: Send + Sync {
    /// Pending transactions to include in the next proposal, already
    /// de-duplicated and ordered, capped by `max_gas`.
    async fn collect_transactions(&self, max_gas: u64) -> Vec<Vec<u8>>;

    /// Deeper, application-specific validation run once a block is fully
    /// reassembled and has passed `Block::validate_basic`.
    async fn validate_block(&self, block: &Block, last_commit: Option<&Commit>) -> Result<(), ValidationError>;

    /// Executes and persists `block`, given the `seen_commit` that actually
    /// triggered the commit (distinct from `block.last_commit`).
    async fn commit_block(&self, block: &Block, seen_commit: &Commit) -> Result<Hash, CommitError>;

    /// Surfaces double-sign/equivocation evidence for downstream handling
    /// (e.g. slashing) — the core only detects and reports it.
    async fn add_evidence(&self, evidence: Evidence);
}
