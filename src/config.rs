//! Tunable consensus parameters. `Default` reproduces the recommended
//! constants exactly so tests can rely on them without re-stating the
//! numbers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::block::DEFAULT_PART_SIZE_BYTES;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub chain_id: String,

    pub timeout_propose_base_ms: u64,
    pub timeout_propose_delta_ms: u64,
    pub timeout_prevote_base_ms: u64,
    pub timeout_prevote_delta_ms: u64,
    pub timeout_precommit_base_ms: u64,
    pub timeout_precommit_delta_ms: u64,
    pub timeout_commit_ms: u64,

    pub part_size_bytes: usize,

    pub max_block_txs: usize,
    pub max_block_gas: u64,
}

impl ConsensusConfig {
    pub fn timeout_propose(&self, round: u32) -> Duration {
        Duration::from_millis(self.timeout_propose_base_ms + self.timeout_propose_delta_ms * round as u64)
    }

    pub fn timeout_prevote(&self, round: u32) -> Duration {
        Duration::from_millis(self.timeout_prevote_base_ms + self.timeout_prevote_delta_ms * round as u64)
    }

    pub fn timeout_precommit(&self, round: u32) -> Duration {
        Duration::from_millis(self.timeout_precommit_base_ms + self.timeout_precommit_delta_ms * round as u64)
    }

    pub fn timeout_commit(&self) -> Duration {
        Duration::from_millis(self.timeout_commit_ms)
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            chain_id: "kardia-consensus".to_string(),
            timeout_propose_base_ms: 3000,
            timeout_propose_delta_ms: 500,
            timeout_prevote_base_ms: 1000,
            timeout_prevote_delta_ms: 500,
            timeout_precommit_base_ms: 1000,
            timeout_precommit_delta_ms: 500,
            timeout_commit_ms: 1000,
            part_size_bytes: DEFAULT_PART_SIZE_BYTES,
            max_block_txs: 10_000,
            max_block_gas: 50_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeouts_match_the_spec_constants() {
        let cfg = ConsensusConfig::default();
        assert_eq!(cfg.timeout_propose(0), Duration::from_millis(3000));
        assert_eq!(cfg.timeout_propose(2), Duration::from_millis(4000));
        assert_eq!(cfg.timeout_prevote(1), Duration::from_millis(1500));
        assert_eq!(cfg.timeout_precommit(1), Duration::from_millis(1500));
        assert_eq!(cfg.timeout_commit(), Duration::from_millis(1000));
    }
}
