//! The persisted-state boundary: `BlockOperations` consumes a narrow
//! `BlockStore` trait rather than a concrete database, breaking the
//! `BlockChain <-> BlockOperations <-> ConsensusState` cycle a direct
//! dependency would create.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockId, Commit, PartSet};
use crate::crypto::Hash;
use crate::validators::ValidatorSet;

/// `state -> {LastBlockHeight, LastBlockID, LastBlockTime, ...}` from the
/// persisted-state layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainState {
    pub last_block_height: u64,
    pub last_block_id: BlockId,
    pub last_block_time: chrono::DateTime<chrono::Utc>,
    pub validators: ValidatorSet,
    pub last_validators: ValidatorSet,
    pub last_height_validators_changed: u64,
}

/// Logical persisted layout: `block/{height}`, `part/{height}/{index}`,
/// `commit/{height}`, `seen-commit/{height}`, `state`. Implementations
/// choose the physical storage; the core only relies on this contract.
#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn save_block(&self, block: Block, parts: PartSet, seen_commit: Commit);
    async fn load_block(&self, height: u64) -> Option<Block>;
    async fn load_block_parts(&self, height: u64) -> Option<PartSet>;
    /// The commit *included in* the block at `height + 1` (i.e. the commit
    /// of the block at `height`), distinct from the seen-commit.
    async fn load_commit(&self, height: u64) -> Option<Commit>;
    /// The +2/3 precommit set that actually triggered the commit of the
    /// block at `height` on this node.
    async fn load_seen_commit(&self, height: u64) -> Option<Commit>;
    async fn load_state(&self) -> Option<ChainState>;
    async fn save_state(&self, state: ChainState);
    async fn height(&self) -> u64;
}

/// An in-memory `BlockStore`, backed by `dashmap`'s concurrent maps so it
/// can be shared across the consensus worker and read-only RPC-style
/// callers without an external `RwLock`. Intended for tests and
/// single-process demos, not production durability.
#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: DashMap<u64, Block>,
    parts: DashMap<u64, PartSet>,
    commits: DashMap<u64, Commit>,
    seen_commits: DashMap<u64, Commit>,
    state: DashMap<(), ChainState>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn save_block(&self, block: Block, parts: PartSet, seen_commit: Commit) {
        let height = block.header.height;
        // The commit carried inside a block at `height` is the commit *of*
        // the block at `height - 1`; store it under that height so
        // `load_commit` can answer for it.
        if height > 0 {
            if let Some(last_commit) = block.last_commit.clone() {
                self.commits.insert(height - 1, last_commit);
            }
        }
        self.blocks.insert(height, block);
        self.parts.insert(height, parts);
        self.seen_commits.insert(height, seen_commit);
    }

    async fn load_block(&self, height: u64) -> Option<Block> {
        self.blocks.get(&height).map(|b| b.clone())
    }

    async fn load_block_parts(&self, height: u64) -> Option<PartSet> {
        self.parts.get(&height).map(|p| p.clone())
    }

    async fn load_commit(&self, height: u64) -> Option<Commit> {
        self.commits.get(&height).map(|c| c.clone())
    }

    async fn load_seen_commit(&self, height: u64) -> Option<Commit> {
        self.seen_commits.get(&height).map(|c| c.clone())
    }

    async fn load_state(&self) -> Option<ChainState> {
        self.state.get(&()).map(|s| s.clone())
    }

    async fn save_state(&self, state: ChainState) {
        self.state.insert((), state);
    }

    async fn height(&self) -> u64 {
        self.state.get(&()).map(|s| s.last_block_height).unwrap_or(0)
    }
}
