//! Votes and vote accounting: signed pre-votes and pre-commits,
//! per-round tallying, and the per-height collection of vote sets
//! across rounds.

mod height_vote_set;
mod vote;
mod vote_set;

pub use height_vote_set::HeightVoteSet;
pub use vote::{Vote, VoteType};
pub use vote_set::{AddVoteOutcome, VoteSet, VoteSetError};
