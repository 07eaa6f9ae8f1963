//! A six-kind error taxonomy, encoded so call sites can log and dispatch
//! without re-deriving which class an error belongs to.

use thiserror::Error;

use crate::block::{BlockError, CommitError};
use crate::evidence::Evidence;
use crate::vote::VoteSetError;

/// `Invalid` and `Stale` are expected, frequent, and handled by dropping
/// the offending message; `Conflicting` carries evidence as a side effect
/// rather than failing an operation; `Contractual` and `FatalApp` are this
/// crate's halt primitive — callers should treat them as fatal rather than
/// retry. `TransientApp` is retried by the caller with backoff before it
/// escalates to a halt.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("invalid: {0}")]
    Invalid(String),

    #[error("stale event for height={height} round={round}: {reason}")]
    Stale { height: u64, round: u32, reason: String },

    #[error("conflicting vote from a validator")]
    Conflicting(Box<Evidence>),

    #[error("contractual violation: {0}")]
    Contractual(String),

    #[error("application temporarily unable to proceed: {0}")]
    TransientApp(String),

    #[error("fatal application divergence at height {height}: {reason}")]
    FatalApp { height: u64, reason: String },
}

impl ConsensusError {
    /// `Contractual` and `FatalApp` are this crate's halt primitive:
    /// recoverable error handling stops and the engine refuses to continue.
    pub fn is_halting(&self) -> bool {
        matches!(self, ConsensusError::Contractual(_) | ConsensusError::FatalApp { .. })
    }
}

impl From<BlockError> for ConsensusError {
    fn from(err: BlockError) -> Self {
        ConsensusError::Invalid(err.to_string())
    }
}

impl From<CommitError> for ConsensusError {
    fn from(err: CommitError) -> Self {
        ConsensusError::Invalid(err.to_string())
    }
}

impl From<VoteSetError> for ConsensusError {
    fn from(err: VoteSetError) -> Self {
        ConsensusError::Invalid(err.to_string())
    }
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
