//! `RoundState`: the volatile per-height state owned exclusively by the
//! consensus worker — never exposed by mutable reference outside it.

use chrono::{DateTime, Utc};

use crate::block::{Block, Commit, PartSet};
use crate::validators::ValidatorSet;
use crate::vote::HeightVoteSet;

use super::proposal::Proposal;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    NewHeight,
    NewRound,
    Propose,
    Prevote,
    PrevoteWait,
    Precommit,
    PrecommitWait,
    Commit,
}

pub struct RoundState {
    pub height: u64,
    pub round: u32,
    pub step: Step,
    pub start_time: DateTime<Utc>,

    pub proposal: Option<Proposal>,
    pub proposal_block: Option<Block>,
    pub proposal_block_parts: Option<PartSet>,

    pub locked_round: Option<u32>,
    pub locked_block: Option<Block>,
    pub locked_block_parts: Option<PartSet>,

    pub valid_round: Option<u32>,
    pub valid_block: Option<Block>,
    pub valid_block_parts: Option<PartSet>,

    pub votes: HeightVoteSet,
    pub commit_round: Option<u32>,
    pub last_commit: Option<Commit>,
    pub validators: ValidatorSet,
}

impl RoundState {
    pub fn new_height(chain_id: String, height: u64, validators: ValidatorSet, last_commit: Option<Commit>) -> Self {
        let votes = HeightVoteSet::new(chain_id, height, validators.clone());
        Self {
            height,
            round: 0,
            step: Step::NewHeight,
            start_time: Utc::now(),
            proposal: None,
            proposal_block: None,
            proposal_block_parts: None,
            locked_round: None,
            locked_block: None,
            locked_block_parts: None,
            valid_round: None,
            valid_block: None,
            valid_block_parts: None,
            votes,
            commit_round: None,
            last_commit,
            validators,
        }
    }

    /// Clears everything that is per-round rather than per-height, in
    /// preparation for entering a new round at the same height.
    pub fn reset_for_new_round(&mut self, round: u32) {
        self.round = round;
        self.step = Step::NewRound;
        self.start_time = Utc::now();
        self.proposal = None;
        self.proposal_block = None;
        self.proposal_block_parts = None;
    }

    pub fn is_locked(&self) -> bool {
        self.locked_block.is_some()
    }
}
