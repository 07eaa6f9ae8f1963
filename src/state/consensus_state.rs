//! The per-height/round consensus state machine: drives
//! `NewHeight -> Propose -> Prevote -> Precommit -> Commit`, enforcing
//! locking, valid-block/POL, and timeout rules.
//!
//! This module holds the *pure* transition logic: no I/O, no signing, no
//! async. It mutates an owned `RoundState` and returns `Effect`s describing
//! what the caller (the reactor) must do — sign and broadcast a
//! vote, assemble and propose a block, schedule a timer, persist a commit.
//! Keeping signing and networking out of this type is what makes the
//! locking/POL rules unit-testable without a runtime.

use std::time::Duration;

use crate::block::{Block, BlockId, PartSet};
use crate::config::ConsensusConfig;
use crate::crypto::Address;
use crate::error::ConsensusError;
use crate::evidence::{EquivocatingProposalEvidence, Evidence};
use crate::validators::ValidatorSet;
use crate::vote::{AddVoteOutcome, Vote, VoteType};

use super::events::TimeoutEvent;
use super::proposal::Proposal;
use super::round_state::{RoundState, Step};

/// Side effects the consensus worker must carry out; `ConsensusState`
/// itself never performs I/O.
#[derive(Debug)]
pub enum Effect {
    ScheduleTimeout(TimeoutEvent, Duration),
    /// This node is the proposer for the round just entered: assemble a
    /// block (or re-propose `pol_block_id` if one is carried forward),
    /// sign a `Proposal`, and gossip it plus its parts.
    AssembleAndProposeBlock { height: u64, round: u32, pol_round: Option<u32>, pol_block_id: Option<BlockId> },
    /// Sign a vote of `vote_type` for `block_id` (`BlockId::zero()` means
    /// nil) and both broadcast it and feed it back into `add_vote`.
    CastVote { vote_type: VoteType, block_id: BlockId },
    /// +2/3 precommits for a non-nil block: persist it via
    /// `BlockOperations`, then call `enter_new_height`.
    Commit { height: u64, round: u32, block_id: BlockId },
    SurfaceEvidence(Evidence),
}

pub struct ConsensusState {
    config: ConsensusConfig,
    chain_id: String,
    self_address: Option<Address>,
    round_state: RoundState,
    timeout_generation: u64,
}

impl ConsensusState {
    pub fn new(config: ConsensusConfig, self_address: Option<Address>, height: u64, validators: ValidatorSet) -> Self {
        let chain_id = config.chain_id.clone();
        Self {
            round_state: RoundState::new_height(chain_id.clone(), height, validators, None),
            config,
            chain_id,
            self_address,
            timeout_generation: 0,
        }
    }

    pub fn round_state(&self) -> &RoundState {
        &self.round_state
    }

    /// The fully reassembled block matching `block_id`, if this node has
    /// one cached as a proposal, valid, or locked block. Used by the
    /// reactor to fetch the block a `CastVote`/`Commit` effect refers to.
    pub fn candidate_block(&self, block_id: &BlockId) -> Option<(&Block, &PartSet)> {
        self.block_for(block_id)
    }

    fn advance_step(&mut self, step: Step) {
        self.round_state.step = step;
        self.timeout_generation += 1;
    }

    fn schedule_timeout(&self, duration: Duration) -> Effect {
        Effect::ScheduleTimeout(
            TimeoutEvent {
                height: self.round_state.height,
                round: self.round_state.round,
                step: self.round_state.step,
                generation: self.timeout_generation,
            },
            duration,
        )
    }

    fn is_proposer(&self) -> bool {
        self.self_address == Some(self.round_state.validators.get_proposer().address())
    }

    fn block_for(&self, block_id: &BlockId) -> Option<(&Block, &PartSet)> {
        let candidates = [
            (&self.round_state.proposal_block, &self.round_state.proposal_block_parts),
            (&self.round_state.valid_block, &self.round_state.valid_block_parts),
            (&self.round_state.locked_block, &self.round_state.locked_block_parts),
        ];
        for (block, parts) in candidates {
            if let (Some(b), Some(p)) = (block, parts) {
                if b.header.hash() == block_id.hash {
                    return Some((b, p));
                }
            }
        }
        None
    }

    /// `CollectTransactions`/`SaveBlock` having already advanced the
    /// store's height, start the next one.
    pub fn enter_new_height(&mut self, height: u64, validators: ValidatorSet, last_commit: Option<crate::block::Commit>) -> Vec<Effect> {
        self.round_state = RoundState::new_height(self.chain_id.clone(), height, validators, last_commit);
        self.timeout_generation = 0;
        self.enter_new_round(0)
    }

    /// Upon entering `NewRound`, the validator set is advanced by
    /// `IncrementAccum(1)` and the new proposer signs for this round.
    pub fn enter_new_round(&mut self, round: u32) -> Vec<Effect> {
        self.round_state.reset_for_new_round(round);
        self.round_state.validators.increment_accum(1);
        self.enter_propose()
    }

    fn enter_propose(&mut self) -> Vec<Effect> {
        self.advance_step(Step::Propose);
        let mut effects = vec![self.schedule_timeout(self.config.timeout_propose(self.round_state.round))];
        if self.is_proposer() {
            let (pol_round, pol_block_id) = match self.round_state.valid_round {
                Some(round) => (Some(round), self.round_state.valid_block.as_ref().map(|b| BlockId {
                    hash: b.header.hash(),
                    part_set_header: self.round_state.valid_block_parts.as_ref().unwrap().header(),
                })),
                None => (None, None),
            };
            effects.push(Effect::AssembleAndProposeBlock {
                height: self.round_state.height,
                round: self.round_state.round,
                pol_round,
                pol_block_id,
            });
        }
        effects
    }

    /// `NewProposalMessage`: validate signature, store the proposal, and
    /// allocate a receiving `PartSet`. A second, distinct proposal from the
    /// same proposer for this `(height, round)` is equivocation evidence;
    /// the first one stored is kept.
    pub fn handle_proposal(&mut self, proposal: Proposal) -> Vec<Effect> {
        if proposal.height != self.round_state.height || proposal.round != self.round_state.round {
            return vec![]; // stale or future: dropped, logged by the caller
        }
        let proposer = self.round_state.validators.get_proposer();
        if proposal.proposer_address != proposer.address() {
            return vec![]; // not from the designated proposer: drop
        }
        if !proposal.verify(&self.chain_id, proposer.pub_key()) {
            return vec![];
        }
        if let Some(existing) = &self.round_state.proposal {
            if existing.block_parts_header.hash != proposal.block_parts_header.hash {
                return vec![Effect::SurfaceEvidence(Evidence::EquivocatingProposal(EquivocatingProposalEvidence {
                    proposer_address: proposer.address(),
                    height: proposal.height,
                    round: proposal.round,
                    block_hash_a: existing.block_parts_header.hash,
                    block_hash_b: proposal.block_parts_header.hash,
                }))];
            }
            return vec![];
        }
        self.round_state.proposal_block_parts = Some(PartSet::new_from_header(proposal.block_parts_header));
        self.round_state.proposal = Some(proposal);
        vec![]
    }

    /// `NewBlockPartMessage`: add the part; on completion, validate the
    /// reassembled block and enter `Prevote` if we are still in `Propose`.
    pub fn handle_block_part(&mut self, height: u64, round: u32, part: crate::block::Part) -> Result<Vec<Effect>, ConsensusError> {
        if height != self.round_state.height || round != self.round_state.round {
            return Ok(vec![]);
        }
        let Some(parts) = self.round_state.proposal_block_parts.as_mut() else {
            return Ok(vec![]); // no proposal seen yet to infer a header from: drop
        };
        if !parts.add_part(part) {
            return Ok(vec![]);
        }
        if !parts.is_complete() {
            return Ok(vec![]);
        }
        let bytes = parts.assemble().expect("just completed");
        let block: Block = match serde_json::from_slice(&bytes) {
            Ok(block) => block,
            Err(_) => return Ok(vec![]), // malformed: Invalid class, drop
        };
        if block.validate_basic(&self.chain_id).is_err() {
            return Ok(vec![]);
        }
        self.round_state.proposal_block = Some(block);
        if self.round_state.step == Step::Propose {
            return Ok(self.enter_prevote());
        }
        Ok(vec![])
    }

    fn prevote_target(&self) -> BlockId {
        if let Some(locked_round) = self.round_state.locked_round {
            if let Some(pol_round) = self.round_state.votes.pol_round() {
                if pol_round >= locked_round {
                    if let Some(maj) = self.round_state.votes.prevotes(pol_round).and_then(|vs| vs.maj23()) {
                        if !maj.is_zero() && self.block_for(&maj).is_some() {
                            return maj;
                        }
                    }
                }
            }
            let locked = self.round_state.locked_block.as_ref().unwrap();
            return BlockId {
                hash: locked.header.hash(),
                part_set_header: self.round_state.locked_block_parts.as_ref().unwrap().header(),
            };
        }
        if let (Some(proposal), Some(block)) = (&self.round_state.proposal, &self.round_state.proposal_block) {
            return BlockId { hash: block.header.hash(), part_set_header: proposal.block_parts_header };
        }
        BlockId::zero()
    }

    fn enter_prevote(&mut self) -> Vec<Effect> {
        let block_id = self.prevote_target();
        self.advance_step(Step::PrevoteWait);
        vec![
            Effect::CastVote { vote_type: VoteType::Prevote, block_id },
            self.schedule_timeout(self.config.timeout_prevote(self.round_state.round)),
        ]
    }

    fn enter_precommit(&mut self, round: u32, decided: Option<BlockId>) -> Vec<Effect> {
        let owned = decided.and_then(|block_id| {
            self.block_for(&block_id).map(|(b, p)| (block_id, b.clone(), p.clone()))
        });
        let block_id = match owned {
            Some((block_id, block, parts)) => {
                self.round_state.locked_round = Some(round);
                self.round_state.locked_block = Some(block);
                self.round_state.locked_block_parts = Some(parts);
                block_id
            }
            None => BlockId::zero(),
        };
        self.advance_step(Step::PrecommitWait);
        vec![
            Effect::CastVote { vote_type: VoteType::Precommit, block_id },
            self.schedule_timeout(self.config.timeout_precommit(self.round_state.round)),
        ]
    }

    fn enter_commit(&mut self, commit_round: u32, block_id: BlockId) -> Vec<Effect> {
        self.advance_step(Step::Commit);
        self.round_state.commit_round = Some(commit_round);
        vec![Effect::Commit { height: self.round_state.height, round: commit_round, block_id }]
    }

    /// `NewVoteMessage`: dispatch to the round's `VoteSet`; on a fresh +2/3
    /// crossing, advance the step per the transition diagram.
    pub fn handle_vote(&mut self, vote: Vote) -> Vec<Effect> {
        if vote.height != self.round_state.height {
            return vec![]; // stale or future height
        }
        let vote_round = vote.round;
        let vote_type = vote.vote_type;
        match self.round_state.votes.add_vote(vote) {
            Err(_) => return vec![], // Invalid: dropped silently
            Ok(AddVoteOutcome::Duplicate) => return vec![],
            Ok(AddVoteOutcome::Conflicting(evidence)) => {
                return vec![Effect::SurfaceEvidence(Evidence::DuplicateVote(evidence))]
            }
            Ok(AddVoteOutcome::Added) => {}
        }

        let mut effects = Vec::new();

        if vote_type == VoteType::Prevote {
            effects.extend(self.update_valid_block_from_pol(vote_round));
            if vote_round == self.round_state.round && self.round_state.step == Step::PrevoteWait {
                if let Some(maj) = self.round_state.votes.prevotes(vote_round).and_then(|vs| vs.maj23()) {
                    if maj.is_zero() {
                        effects.extend(self.enter_precommit(vote_round, None));
                    } else {
                        effects.extend(self.enter_precommit(vote_round, Some(maj)));
                    }
                }
            }
        } else if vote_type == VoteType::Precommit
            && vote_round == self.round_state.round
            && self.round_state.step == Step::PrecommitWait
        {
            if let Some(maj) = self.round_state.votes.precommits(vote_round).and_then(|vs| vs.maj23()) {
                if maj.is_zero() {
                    effects.extend(self.enter_new_round(self.round_state.round + 1));
                } else {
                    effects.extend(self.enter_commit(vote_round, maj));
                }
            }
        }

        effects
    }

    /// Whenever a +2/3 prevote for a non-nil block is observed at any
    /// round, it becomes `ValidBlock`/`ValidRound` if that round is newer
    /// than what we already have.
    fn update_valid_block_from_pol(&mut self, round: u32) -> Vec<Effect> {
        let Some(maj) = self.round_state.votes.prevotes(round).and_then(|vs| vs.maj23()) else {
            return vec![];
        };
        if maj.is_zero() {
            return vec![];
        }
        if self.round_state.valid_round.is_some_and(|vr| vr >= round) {
            return vec![];
        }
        if let Some((block, parts)) = self.block_for(&maj).map(|(b, p)| (b.clone(), p.clone())) {
            self.round_state.valid_round = Some(round);
            self.round_state.valid_block = Some(block);
            self.round_state.valid_block_parts = Some(parts);
        }
        vec![]
    }

    /// `TimeoutEvent`: enforced only if it matches the current
    /// `(height, round, step, generation)`; otherwise a stale timer fired
    /// and is ignored.
    pub fn handle_timeout(&mut self, timeout: TimeoutEvent) -> Vec<Effect> {
        if timeout.height != self.round_state.height
            || timeout.round != self.round_state.round
            || timeout.step != self.round_state.step
            || timeout.generation != self.timeout_generation
        {
            return vec![];
        }
        match self.round_state.step {
            Step::Propose => self.enter_prevote(),
            Step::PrevoteWait => self.enter_precommit(self.round_state.round, None),
            Step::PrecommitWait => self.enter_new_round(self.round_state.round + 1),
            _ => vec![],
        }
    }
}
