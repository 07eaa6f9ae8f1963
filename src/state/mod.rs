//! The consensus state machine: `Proposal`, `RoundState`, the events it
//! consumes, and `ConsensusState` itself.

mod consensus_state;
mod events;
mod proposal;
mod round_state;

pub use consensus_state::{ConsensusState, Effect};
pub use events::{ConsensusEvent, TimeoutEvent};
pub use proposal::Proposal;
pub use round_state::{RoundState, Step};
