//! Per-height collection of `VoteSet`s across every round seen so far, so
//! the state machine can query majority status at any past round without
//! re-deriving it.

use std::collections::HashMap;

use crate::validators::ValidatorSet;

use super::vote::{Vote, VoteType};
use super::vote_set::{AddVoteOutcome, VoteSet, VoteSetError};

struct RoundVoteSets {
    prevotes: VoteSet,
    precommits: VoteSet,
}

pub struct HeightVoteSet {
    chain_id: String,
    height: u64,
    validators: ValidatorSet,
    rounds: HashMap<u32, RoundVoteSets>,
    peer_catchup_rounds: HashMap<String, Vec<u32>>,
}

impl HeightVoteSet {
    pub fn new(chain_id: String, height: u64, validators: ValidatorSet) -> Self {
        Self {
            chain_id,
            height,
            validators,
            rounds: HashMap::new(),
            peer_catchup_rounds: HashMap::new(),
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    fn round_entry(&mut self, round: u32) -> &mut RoundVoteSets {
        self.rounds.entry(round).or_insert_with(|| RoundVoteSets {
            prevotes: VoteSet::new(self.chain_id.clone(), self.height, round, VoteType::Prevote, self.validators.clone()),
            precommits: VoteSet::new(self.chain_id.clone(), self.height, round, VoteType::Precommit, self.validators.clone()),
        })
    }

    pub fn prevotes(&self, round: u32) -> Option<&VoteSet> {
        self.rounds.get(&round).map(|r| &r.prevotes)
    }

    pub fn precommits(&self, round: u32) -> Option<&VoteSet> {
        self.rounds.get(&round).map(|r| &r.precommits)
    }

    /// Routes `vote` to the `VoteSet` for its `(round, type)`, creating that
    /// round's vote sets on first use.
    pub fn add_vote(&mut self, vote: Vote) -> Result<AddVoteOutcome, VoteSetError> {
        let round = vote.round;
        let vote_type = vote.vote_type;
        let round_sets = self.round_entry(round);
        match vote_type {
            VoteType::Prevote => round_sets.prevotes.add_vote(vote),
            VoteType::Precommit => round_sets.precommits.add_vote(vote),
        }
    }

    /// The highest round (if any) that has a +2/3 prevote majority for a
    /// non-nil block — the POL round the consensus state uses to compute
    /// `ValidRound`/`ValidBlock`.
    pub fn pol_round(&self) -> Option<u32> {
        let mut rounds: Vec<u32> = self.rounds.keys().copied().collect();
        rounds.sort_unstable();
        rounds
            .into_iter()
            .rev()
            .find(|round| {
                self.prevotes(*round)
                    .and_then(|vs| vs.maj23())
                    .is_some_and(|block_id| !block_id.is_zero())
            })
    }

    pub fn record_peer_catchup_round(&mut self, peer_id: String, round: u32) {
        let rounds = self.peer_catchup_rounds.entry(peer_id).or_default();
        if !rounds.contains(&round) {
            rounds.push(round);
        }
    }

    pub fn peer_catchup_rounds(&self, peer_id: &str) -> &[u32] {
        self.peer_catchup_rounds
            .get(peer_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockId;
    use crate::crypto::{Hash, Keypair, Signature};
    use crate::validators::Validator;
    use chrono::{DateTime, Utc};

    fn set_of(n: usize) -> (Vec<Keypair>, ValidatorSet) {
        let keypairs: Vec<_> = (0..n).map(|_| Keypair::generate()).collect();
        let validators = keypairs.iter().map(|k| Validator::new(k.public_key().clone(), 100)).collect();
        (keypairs, ValidatorSet::new(validators).unwrap())
    }

    fn vote(chain_id: &str, keypair: &Keypair, index: usize, round: u32, vote_type: VoteType, block_id: BlockId) -> Vote {
        let mut v = Vote {
            validator_address: keypair.address(),
            validator_index: index,
            height: 1,
            round,
            timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            vote_type,
            block_id,
            signature: Signature::from_bytes(&[0u8; 65]).unwrap(),
        };
        v.signature = keypair.sign(&v.sign_bytes(chain_id));
        v
    }

    #[test]
    fn pol_round_finds_the_highest_round_with_a_non_nil_majority() {
        let (keypairs, set) = set_of(4);
        let chain_id = "chain";
        let mut hvs = HeightVoteSet::new(chain_id.into(), 1, set);
        let block_id = BlockId { hash: Hash::digest(b"b"), part_set_header: Default::default() };
        for i in 0..3 {
            hvs.add_vote(vote(chain_id, &keypairs[i], i, 0, VoteType::Prevote, block_id)).unwrap();
        }
        assert_eq!(hvs.pol_round(), Some(0));
        // Round 1 only has a minority; round 0 still wins.
        hvs.add_vote(vote(chain_id, &keypairs[0], 0, 1, VoteType::Prevote, block_id)).unwrap();
        assert_eq!(hvs.pol_round(), Some(0));
    }

    #[test]
    fn pol_round_is_none_without_any_non_nil_majority() {
        let (keypairs, set) = set_of(4);
        let chain_id = "chain";
        let mut hvs = HeightVoteSet::new(chain_id.into(), 1, set);
        hvs.add_vote(vote(chain_id, &keypairs[0], 0, 0, VoteType::Prevote, BlockId::zero())).unwrap();
        assert_eq!(hvs.pol_round(), None);
    }

    #[test]
    fn rounds_are_created_lazily_on_first_vote() {
        let (_, set) = set_of(4);
        let hvs = HeightVoteSet::new("chain".into(), 1, set);
        assert!(hvs.prevotes(0).is_none());
    }
}
