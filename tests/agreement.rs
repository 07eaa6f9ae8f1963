//! Agreement (P1): two correct validators, each running their own
//! `ConsensusState`, converge on the same committed block when fed the
//! same proposal, parts and votes in the same order.

use chrono::{DateTime, Utc};
use kardia_consensus::{
    Address, Block, BlockId, ConsensusConfig, ConsensusState, Effect, Hash, Header, Keypair,
    PartSet, Proposal, Signature, ValidatorSet, Validator, Vote, VoteType,
};

struct Fixture {
    keypairs: Vec<Keypair>,
    validators: ValidatorSet,
    chain_id: String,
}

fn fixture(n: usize) -> Fixture {
    let keypairs: Vec<_> = (0..n).map(|_| Keypair::generate()).collect();
    let validators = keypairs.iter().map(|k| Validator::new(k.public_key().clone(), 100)).collect();
    Fixture {
        keypairs,
        validators: ValidatorSet::new(validators).unwrap(),
        chain_id: "kardia-agreement".to_string(),
    }
}

fn config(chain_id: &str) -> ConsensusConfig {
    ConsensusConfig { chain_id: chain_id.to_string(), ..ConsensusConfig::default() }
}

fn empty_block(height: u64) -> (Block, PartSet) {
    let header = Header {
        height,
        time: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        num_txs: 0,
        gas_limit: 1,
        gas_used: 0,
        last_block_id: BlockId::zero(),
        coinbase: Address::zero(),
        last_commit_hash: Hash::zero(),
        tx_hash: Hash::zero(),
        root: Hash::zero(),
        receipt_hash: Hash::zero(),
        bloom: vec![],
        validators_hash: Hash::zero(),
        consensus_hash: Hash::zero(),
    };
    let block = Block { header, transactions: vec![], last_commit: None };
    let bytes = serde_json::to_vec(&block).unwrap();
    let parts = PartSet::from_data(&bytes, 65536);
    (block, parts)
}

fn sign_proposal(chain_id: &str, keypair: &Keypair, height: u64, round: u32, header: kardia_consensus::PartSetHeader) -> Proposal {
    let mut proposal = Proposal {
        height,
        round,
        pol_round: None,
        block_parts_header: header,
        proposer_address: keypair.address(),
        timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        signature: Signature::from_bytes(&[0u8; 65]).unwrap(),
    };
    proposal.signature = keypair.sign(&proposal.sign_bytes(chain_id));
    proposal
}

fn sign_vote(chain_id: &str, keypair: &Keypair, index: usize, height: u64, round: u32, vote_type: VoteType, block_id: BlockId) -> Vote {
    let mut vote = Vote {
        validator_address: keypair.address(),
        validator_index: index,
        height,
        round,
        timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        vote_type,
        block_id,
        signature: Signature::from_bytes(&[0u8; 65]).unwrap(),
    };
    vote.signature = keypair.sign(&vote.sign_bytes(chain_id));
    vote
}

fn proposer_index(validators: &ValidatorSet, round: u32) -> usize {
    let mut probe = validators.clone();
    probe.increment_accum((round + 1) as u64);
    let proposer_addr = probe.get_proposer().address();
    validators.get_by_address(&proposer_addr).unwrap().0
}

/// Drives `cs` through the same sequence of inputs a real network would
/// deliver; returns whatever `Effect::Commit` it produced, if any.
fn run_happy_path(cs: &mut ConsensusState, chain_id: &str, fx: &Fixture, proposer_idx: usize, parts: &PartSet) -> Option<(u64, u32, BlockId)> {
    cs.enter_new_round(0);
    let proposal = sign_proposal(chain_id, &fx.keypairs[proposer_idx], 1, 0, parts.header());
    cs.handle_proposal(proposal);
    for i in 0..parts.total() {
        cs.handle_block_part(1, 0, parts.get_part(i).unwrap().clone()).unwrap();
    }
    let block_id = BlockId { hash: cs.round_state().proposal_block.as_ref().unwrap().header.hash(), part_set_header: parts.header() };

    for i in 0..fx.keypairs.len() {
        cs.handle_vote(sign_vote(chain_id, &fx.keypairs[i], i, 1, 0, VoteType::Prevote, block_id));
    }
    let mut commit = None;
    for i in 0..fx.keypairs.len() {
        let effects = cs.handle_vote(sign_vote(chain_id, &fx.keypairs[i], i, 1, 0, VoteType::Precommit, block_id));
        for effect in effects {
            if let Effect::Commit { height, round, block_id } = effect {
                commit = Some((height, round, block_id));
            }
        }
    }
    commit
}

/// Every correct validator that fed the same messages decides the
/// same block at the same height, independent of how each one privately
/// tracks `self_address` or proposer status.
#[test]
fn two_independent_validators_commit_the_same_block() {
    let fx = fixture(4);
    let chain_id = fx.chain_id.clone();
    let proposer_idx = proposer_index(&fx.validators, 0);
    let (_, parts) = empty_block(1);

    let mut validator_a = ConsensusState::new(config(&chain_id), Some(fx.keypairs[0].address()), 1, fx.validators.clone());
    let mut validator_b = ConsensusState::new(config(&chain_id), Some(fx.keypairs[1].address()), 1, fx.validators.clone());

    let commit_a = run_happy_path(&mut validator_a, &chain_id, &fx, proposer_idx, &parts).expect("validator A should commit");
    let commit_b = run_happy_path(&mut validator_b, &chain_id, &fx, proposer_idx, &parts).expect("validator B should commit");

    assert_eq!(commit_a, commit_b);
}

/// Agreement still holds when one validator is a silent fourth voter:
/// the three active validators all decide the same block even though
/// none of them ever hears from the fourth.
#[test]
fn agreement_holds_with_one_validator_withholding_votes() {
    let fx = fixture(4);
    let chain_id = fx.chain_id.clone();
    let proposer_idx = proposer_index(&fx.validators, 0);
    let (_, parts) = empty_block(1);

    let active: Vec<usize> = (0..3).collect();
    let mut outcomes = Vec::new();
    for &observer in &active {
        let mut cs = ConsensusState::new(config(&chain_id), Some(fx.keypairs[observer].address()), 1, fx.validators.clone());
        cs.enter_new_round(0);
        let proposal = sign_proposal(&chain_id, &fx.keypairs[proposer_idx], 1, 0, parts.header());
        cs.handle_proposal(proposal);
        for i in 0..parts.total() {
            cs.handle_block_part(1, 0, parts.get_part(i).unwrap().clone()).unwrap();
        }
        let block_id = BlockId { hash: cs.round_state().proposal_block.as_ref().unwrap().header.hash(), part_set_header: parts.header() };
        for &i in &active {
            cs.handle_vote(sign_vote(&chain_id, &fx.keypairs[i], i, 1, 0, VoteType::Prevote, block_id));
        }
        let mut commit = None;
        for &i in &active {
            for effect in cs.handle_vote(sign_vote(&chain_id, &fx.keypairs[i], i, 1, 0, VoteType::Precommit, block_id)) {
                if let Effect::Commit { height, round, block_id } = effect {
                    commit = Some((height, round, block_id));
                }
            }
        }
        outcomes.push(commit.expect("three of four validators should reach +2/3"));
    }
    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(outcomes[1], outcomes[2]);
}
