//! Kardia Consensus
//!
//! A Byzantine-fault-tolerant, PBFT-style consensus core: a fixed validator
//! set, round-robin proposer rotation, and a two-phase (prevote/precommit)
//! voting protocol that commits a block once it carries a +2/3
//! super-majority of voting power.
//!
//! The crate is split along the same seams the design separates: `crypto`,
//! `validators`, `block`, `vote` (per-round and per-height vote tallying),
//! `state` (the pure `ConsensusState` transition logic), `block_operations`
//! (the `Application`/`BlockStore` adapter), and `reactor` (the async
//! worker that drives `ConsensusState` from real timers and network
//! messages). `application`, `store`, and `broadcast` define the boundary
//! traits a host process implements to plug in execution, persistence, and
//! transport.

pub mod application;
pub mod block;
pub mod block_operations;
pub mod broadcast;
pub mod config;
pub mod crypto;
pub mod error;
pub mod evidence;
pub mod reactor;
pub mod state;
pub mod store;
pub mod validators;
pub mod vote;

pub use application::{Application, CommitError as ApplicationCommitError, ValidationError};
pub use block::{Block, BlockError, BlockId, Commit, CommitError, Header, Part, PartSet, PartSetHeader};
pub use block_operations::{BlockOperations, BlockOperationsError};
pub use broadcast::{InMemoryNetwork, InMemoryPeer, Message, PeerBroadcast, PeerId, Unreachable};
pub use config::ConsensusConfig;
pub use crypto::{Address, CanonicalBytes, CryptoError, Hash, Keypair, PublicKey, Signature};
pub use error::{ConsensusError, ConsensusResult};
pub use evidence::{DuplicateVoteEvidence, EquivocatingProposalEvidence, Evidence};
pub use reactor::ConsensusWorker;
pub use state::{ConsensusEvent, ConsensusState, Effect, Proposal, RoundState, Step, TimeoutEvent};
pub use store::{BlockStore, ChainState, MemoryBlockStore};
pub use validators::{GenesisValidator, GenesisValidatorSetBuilder, Validator, ValidatorSet, ValidatorSetError};
pub use vote::{AddVoteOutcome, HeightVoteSet, Vote, VoteSet, VoteSetError, VoteType};
