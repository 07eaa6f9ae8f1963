//! The consensus worker: the single task that owns a `ConsensusState` and
//! is the only thing allowed to call its mutating methods. It translates
//! inbound `PeerBroadcast` messages and fired timers into
//! `ConsensusEvent`s, and `ConsensusState`'s `Effect`s back into signed
//! wire messages and `BlockOperations` calls.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

use crate::application::Application;
use crate::block::{BlockId, Commit};
use crate::block_operations::BlockOperations;
use crate::broadcast::{Message, PeerBroadcast};
use crate::config::ConsensusConfig;
use crate::crypto::{Keypair, Signature};
use crate::state::{ConsensusEvent, ConsensusState, Effect, Proposal, TimeoutEvent};
use crate::store::BlockStore;
use crate::validators::ValidatorSet;
use crate::vote::{Vote, VoteType};

/// Drives one node's participation in consensus. A node with `keypair =
/// None` is an observer: it tracks the state machine and serves reads but
/// never signs a vote or proposal.
pub struct ConsensusWorker<A, S, P> {
    state: ConsensusState,
    block_ops: Arc<BlockOperations<A, S>>,
    broadcast: Arc<P>,
    config: ConsensusConfig,
    keypair: Option<Keypair>,
    next_timeout: Option<(TimeoutEvent, Instant)>,
}

impl<A, S, P> ConsensusWorker<A, S, P>
where
    A: Application + 'static,
    S: BlockStore + 'static,
    P: PeerBroadcast + 'static,
{
    pub fn new(
        config: ConsensusConfig,
        keypair: Option<Keypair>,
        height: u64,
        validators: ValidatorSet,
        block_ops: Arc<BlockOperations<A, S>>,
        broadcast: Arc<P>,
    ) -> Self {
        let self_address = keypair.as_ref().map(|k| k.address());
        Self {
            state: ConsensusState::new(config.clone(), self_address, height, validators),
            block_ops,
            broadcast,
            config,
            keypair,
            next_timeout: None,
        }
    }

    /// Runs until the peer network closes. Intended to be driven inside a
    /// single dedicated task — never called concurrently with itself over
    /// the same `ConsensusWorker`.
    pub async fn run(mut self) {
        let effects = self.state.enter_new_round(0);
        self.dispatch(effects).await;

        loop {
            let deadline = self.next_timeout.as_ref().map(|(_, at)| *at);
            tokio::select! {
                inbound = self.broadcast.recv() => {
                    match inbound {
                        Some((_peer, message)) => self.handle_message(message).await,
                        None => break,
                    }
                }
                _ = sleep_until_opt(deadline), if deadline.is_some() => {
                    if let Some((timeout, _)) = self.next_timeout.take() {
                        let effects = self.apply_event(ConsensusEvent::Timeout(timeout));
                        self.dispatch(effects).await;
                    }
                }
            }
        }
    }

    fn to_event(message: Message) -> Option<ConsensusEvent> {
        match message {
            Message::Proposal {
                height,
                round,
                pol_round,
                block_parts_header,
                proposer_address,
                timestamp,
                signature,
            } => Some(ConsensusEvent::NewProposal {
                proposal: Proposal {
                    height,
                    round,
                    pol_round,
                    block_parts_header,
                    proposer_address,
                    timestamp,
                    signature,
                },
                block_parts_header,
            }),
            Message::BlockPart { height, round, part } => Some(ConsensusEvent::NewBlockPart { height, round, part }),
            Message::Vote(vote) => Some(ConsensusEvent::NewVote { vote }),
            // NewRoundStep/CommitStep/HasVote/ProposalPol/BlockIdClaim are
            // peer catch-up bookkeeping, not state-advancing events.
            _ => None,
        }
    }

    async fn handle_message(&mut self, message: Message) {
        if let Some(event) = Self::to_event(message) {
            let effects = self.apply_event(event);
            self.dispatch(effects).await;
        }
    }

    fn apply_event(&mut self, event: ConsensusEvent) -> Vec<Effect> {
        match event {
            ConsensusEvent::NewProposal { proposal, .. } => self.state.handle_proposal(proposal),
            ConsensusEvent::NewBlockPart { height, round, part } => {
                self.state.handle_block_part(height, round, part).unwrap_or_default()
            }
            ConsensusEvent::NewVote { vote } => self.state.handle_vote(vote),
            ConsensusEvent::Timeout(timeout) => self.state.handle_timeout(timeout),
        }
    }

    /// Drains `effects` breadth-first: each handler returns the further
    /// effects its own action produced (e.g. casting a vote feeds it back
    /// into `add_vote`, which may itself cross a majority). Written as an
    /// explicit queue rather than recursive `async fn` calls, which Rust
    /// cannot do without boxing.
    async fn dispatch(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::ScheduleTimeout(timeout, duration) => {
                    self.next_timeout = Some((timeout, Instant::now() + duration));
                }
                Effect::AssembleAndProposeBlock { height, round, pol_round, pol_block_id } => {
                    let more = self.propose_block(height, round, pol_round, pol_block_id).await;
                    queue.extend(more);
                }
                Effect::CastVote { vote_type, block_id } => {
                    let more = self.cast_vote(vote_type, block_id).await;
                    queue.extend(more);
                }
                Effect::Commit { height, round, block_id } => {
                    let more = self.commit_height(height, round, block_id).await;
                    queue.extend(more);
                }
                Effect::SurfaceEvidence(evidence) => {
                    self.block_ops.application().add_evidence(evidence).await;
                }
            }
        }
    }

    async fn propose_block(
        &mut self,
        height: u64,
        round: u32,
        pol_round: Option<u32>,
        pol_block_id: Option<BlockId>,
    ) -> Vec<Effect> {
        let Some(address) = self.keypair.as_ref().map(|k| k.address()) else { return vec![] };

        let cached = pol_block_id.and_then(|block_id| {
            self.state.candidate_block(&block_id).map(|(b, p)| (b.clone(), p.clone()))
        });

        let (_block, parts) = match cached {
            Some((block, parts)) => {
                tracing::debug!(height, round, pol_hash = %parts.header().hash, "re-proposing the carried-forward valid block instead of assembling a new one");
                (block, parts)
            }
            None => {
                let chain_state = self.block_ops.chain_state().await;
                let validators = self.state.round_state().validators.clone();
                let (last_block_id, validators_hash) = match &chain_state {
                    Some(cs) => (cs.last_block_id, cs.validators.hash()),
                    None => (BlockId::zero(), validators.hash()),
                };
                let last_commit = self.state.round_state().last_commit.clone();
                let txs = self.block_ops.collect_transactions().await;
                let block = self.block_ops.create_block(height, address, last_block_id, last_commit, validators_hash, txs);
                let parts = self.block_ops.make_part_set(&block);
                (block, parts)
            }
        };
        let header = parts.header();

        let mut proposal = Proposal {
            height,
            round,
            pol_round,
            block_parts_header: header,
            proposer_address: address,
            timestamp: Utc::now(),
            signature: Signature::from_bytes(&[0u8; 65]).expect("65 zero bytes is a well-formed placeholder"),
        };
        let sign_bytes = proposal.sign_bytes(&self.config.chain_id);
        proposal.signature = self.keypair.as_ref().expect("checked above").sign(&sign_bytes);

        self.broadcast
            .broadcast(Message::Proposal {
                height,
                round,
                pol_round,
                block_parts_header: header,
                proposer_address: address,
                timestamp: proposal.timestamp,
                signature: proposal.signature,
            })
            .await;

        let mut effects = self.state.handle_proposal(proposal);
        for index in 0..parts.total() {
            let part = parts.get_part(index).expect("index < total").clone();
            self.broadcast.broadcast(Message::BlockPart { height, round, part: part.clone() }).await;
            if let Ok(more) = self.state.handle_block_part(height, round, part) {
                effects.extend(more);
            }
        }
        effects
    }

    /// Gates the prevote on `Application::validate_block`: a candidate
    /// block that fails deeper application validation is treated as if no
    /// block were available, so the node prevotes nil rather than halting.
    async fn cast_vote(&mut self, vote_type: VoteType, block_id: BlockId) -> Vec<Effect> {
        let Some(address) = self.keypair.as_ref().map(|k| k.address()) else { return vec![] };

        let mut block_id = block_id;
        if vote_type == VoteType::Prevote && !block_id.is_zero() {
            let last_commit = self.state.round_state().last_commit.clone();
            let candidate = self.state.candidate_block(&block_id).map(|(b, _)| b.clone());
            let valid = match &candidate {
                Some(block) => self.block_ops.application().validate_block(block, last_commit.as_ref()).await.is_ok(),
                None => false,
            };
            if !valid {
                block_id = BlockId::zero();
            }
        }

        let Some((validator_index, _)) = self.state.round_state().validators.get_by_address(&address) else {
            return vec![]; // not a member of this validator set: observe only
        };

        let mut vote = Vote {
            validator_address: address,
            validator_index,
            height: self.state.round_state().height,
            round: self.state.round_state().round,
            timestamp: Utc::now(),
            vote_type,
            block_id,
            signature: Signature::from_bytes(&[0u8; 65]).expect("65 zero bytes is a well-formed placeholder"),
        };
        let sign_bytes = vote.sign_bytes(&self.config.chain_id);
        vote.signature = self.keypair.as_ref().expect("checked above").sign(&sign_bytes);

        self.broadcast.broadcast(Message::Vote(vote.clone())).await;
        self.state.handle_vote(vote)
    }

    async fn commit_height(&mut self, height: u64, round: u32, block_id: BlockId) -> Vec<Effect> {
        let Some((block, parts)) = self.state.candidate_block(&block_id) else {
            tracing::error!(height, "commit reached with no reassembled block for the decided block id");
            return vec![];
        };
        let block = block.clone();
        let parts = parts.clone();

        let precommits = self
            .state
            .round_state()
            .votes
            .precommits(round)
            .map(|vs| vs.votes().to_vec())
            .unwrap_or_default();
        let seen_commit = Commit { height, round, block_id, precommits };
        let validators = self.state.round_state().validators.clone();

        if let Err(err) = self.block_ops.application().commit_block(&block, &seen_commit).await {
            tracing::error!(height, %err, "application refused to commit; halting at the last consistent height");
            return vec![];
        }
        if let Err(err) = self.block_ops.save_block(block, parts, seen_commit.clone(), validators.clone()).await {
            tracing::error!(height, %err, "failed to persist a committed block");
            return vec![];
        }

        self.state.enter_new_height(height + 1, validators, Some(seen_commit))
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(instant) => tokio::time::sleep_until(instant).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{CommitError as AppCommitError, ValidationError};
    use crate::broadcast::InMemoryNetwork;
    use crate::store::MemoryBlockStore;
    use crate::validators::Validator;
    use async_trait::async_trait;
    use std::time::Duration as StdDuration;

    struct AcceptingApplication;

    #[async_trait]
    impl Application for AcceptingApplication {
        async fn collect_transactions(&self, _max_gas: u64) -> Vec<Vec<u8>> {
            vec![]
        }

        async fn validate_block(&self, _block: &crate::block::Block, _last_commit: Option<&Commit>) -> Result<(), ValidationError> {
            Ok(())
        }

        async fn commit_block(&self, _block: &crate::block::Block, _seen_commit: &Commit) -> Result<crate::crypto::Hash, AppCommitError> {
            Ok(crate::crypto::Hash::zero())
        }

        async fn add_evidence(&self, _evidence: crate::evidence::Evidence) {}
    }

    /// Four workers talking over an in-process network should drive a full
    /// propose/prevote/precommit round and each persist height 1.
    #[tokio::test]
    async fn four_workers_commit_height_one() {
        let keypairs: Vec<_> = (0..4).map(|_| Keypair::generate()).collect();
        let validators = ValidatorSet::new(
            keypairs.iter().map(|k| Validator::new(k.public_key().clone(), 100)).collect(),
        )
        .unwrap();
        let config = ConsensusConfig { chain_id: "reactor-test".to_string(), ..ConsensusConfig::default() };

        let network = InMemoryNetwork::new();
        let mut stores = Vec::new();
        let mut handles = Vec::new();
        for (i, keypair) in keypairs.into_iter().enumerate() {
            let peer = network.join(format!("node-{i}")).await;
            let store = Arc::new(MemoryBlockStore::new());
            stores.push(store.clone());
            let block_ops = Arc::new(BlockOperations::new(Arc::new(AcceptingApplication), store, config.clone(), 0));
            let worker = ConsensusWorker::new(config.clone(), Some(keypair), 1, validators.clone(), block_ops, Arc::new(peer));
            handles.push(tokio::spawn(worker.run()));
        }

        let outcome = tokio::time::timeout(StdDuration::from_secs(10), async {
            loop {
                let mut all_at_height = true;
                for s in stores.iter() {
                    if s.height().await < 1 {
                        all_at_height = false;
                        break;
                    }
                }
                if all_at_height {
                    return;
                }
                tokio::time::sleep(StdDuration::from_millis(20)).await;
            }
        })
        .await;

        for handle in handles {
            handle.abort();
        }
        assert!(outcome.is_ok(), "expected every store to persist height 1 before the timeout");
    }
}
