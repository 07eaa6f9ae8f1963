//! The `PeerBroadcast` boundary and the wire `Message` enum it carries.
//! P2P transport itself is out of scope; this module only defines the
//! contract the reactor talks through, plus an in-memory implementation
//! for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::block::{BlockId, Part, PartSetHeader};
use crate::vote::{Vote, VoteType};

pub type PeerId = String;

/// Wire messages exchanged between peers. `BlockPart` carries the actual
/// chunked bytes; the rest are control/accounting traffic.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[allow(clippy::large_enum_variant)]
pub enum Message {
    NewRoundStep {
        height: u64,
        round: u32,
        step: String,
        seconds_since_start: u64,
        last_commit_round: Option<u32>,
    },
    Proposal {
        height: u64,
        round: u32,
        pol_round: Option<u32>,
        block_parts_header: PartSetHeader,
        proposer_address: crate::crypto::Address,
        timestamp: chrono::DateTime<chrono::Utc>,
        signature: crate::crypto::Signature,
    },
    Vote(Vote),
    CommitStep {
        height: u64,
        block_parts_header: PartSetHeader,
        block_parts_bit_array: Vec<bool>,
    },
    HasVote {
        height: u64,
        round: u32,
        vote_type: VoteType,
        index: usize,
    },
    ProposalPol {
        height: u64,
        pol_round: u32,
        proposal_pol_bit_array: Vec<bool>,
    },
    BlockPart {
        height: u64,
        round: u32,
        part: Part,
    },
    BlockIdClaim {
        height: u64,
        round: u32,
        vote_type: VoteType,
        block_id: BlockId,
    },
}

#[derive(Debug, Error)]
#[error("peer {0} is unreachable")]
pub struct Unreachable(pub PeerId);

/// What the reactor needs from the transport layer: broadcast to everyone,
/// send to one peer, and a stream of inbound `(peer, message)` pairs.
#[async_trait]
pub trait PeerBroadcast: Send + Sync {
    async fn broadcast(&self, message: Message);
    async fn send_to(&self, peer: &PeerId, message: Message) -> Result<(), Unreachable>;
    /// Pulls the next inbound message, or `None` once the network is
    /// closed. A `Stream` in the Application-facing interface; a bounded
    /// channel receiver is the natural in-process realization.
    async fn recv(&self) -> Option<(PeerId, Message)>;
}

/// An in-process broadcast fabric connecting several `PeerBroadcast`
/// handles, modeled the way the teacher crate's `testing` submodules build
/// in-process harnesses (e.g. `enhanced_bft_engine::testing`).
pub struct InMemoryNetwork {
    senders: Mutex<HashMap<PeerId, mpsc::Sender<(PeerId, Message)>>>,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { senders: Mutex::new(HashMap::new()) })
    }

    /// Registers `peer_id` and returns its `PeerBroadcast` handle.
    pub async fn join(self: &Arc<Self>, peer_id: PeerId) -> InMemoryPeer {
        let (tx, rx) = mpsc::channel(1024);
        self.senders.lock().await.insert(peer_id.clone(), tx);
        InMemoryPeer {
            peer_id,
            network: Arc::clone(self),
            inbox: Mutex::new(rx),
        }
    }
}

pub struct InMemoryPeer {
    peer_id: PeerId,
    network: Arc<InMemoryNetwork>,
    inbox: Mutex<mpsc::Receiver<(PeerId, Message)>>,
}

#[async_trait]
impl PeerBroadcast for InMemoryPeer {
    async fn broadcast(&self, message: Message) {
        let senders = self.network.senders.lock().await;
        for (peer_id, sender) in senders.iter() {
            if *peer_id == self.peer_id {
                continue;
            }
            let _ = sender.send((self.peer_id.clone(), message.clone())).await;
        }
    }

    async fn send_to(&self, peer: &PeerId, message: Message) -> Result<(), Unreachable> {
        let senders = self.network.senders.lock().await;
        let Some(sender) = senders.get(peer) else {
            return Err(Unreachable(peer.clone()));
        };
        sender
            .send((self.peer_id.clone(), message))
            .await
            .map_err(|_| Unreachable(peer.clone()))
    }

    async fn recv(&self) -> Option<(PeerId, Message)> {
        self.inbox.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Hash;

    #[tokio::test]
    async fn broadcast_reaches_every_other_peer_but_not_the_sender() {
        let network = InMemoryNetwork::new();
        let a = network.join("a".into()).await;
        let b = network.join("b".into()).await;
        let c = network.join("c".into()).await;

        a.broadcast(Message::HasVote { height: 1, round: 0, vote_type: VoteType::Prevote, index: 0 })
            .await;

        let (from, _) = b.recv().await.unwrap();
        assert_eq!(from, "a");
        let (from, _) = c.recv().await.unwrap();
        assert_eq!(from, "a");
    }

    #[tokio::test]
    async fn send_to_unknown_peer_is_unreachable() {
        let network = InMemoryNetwork::new();
        let a = network.join("a".into()).await;
        let err = a
            .send_to(&"ghost".to_string(), Message::BlockPart {
                height: 1,
                round: 0,
                part: crate::block::PartSet::from_data(b"x", 4).get_part(0).unwrap().clone(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.0, "ghost");
    }

    #[tokio::test]
    async fn send_to_reaches_only_the_named_peer() {
        let network = InMemoryNetwork::new();
        let a = network.join("a".into()).await;
        let b = network.join("b".into()).await;
        let c = network.join("c".into()).await;

        a.send_to(&"b".to_string(), Message::NewRoundStep {
            height: 1,
            round: 0,
            step: "propose".into(),
            seconds_since_start: 0,
            last_commit_round: None,
        })
        .await
        .unwrap();

        assert!(b.recv().await.is_some());
        assert!(tokio::time::timeout(std::time::Duration::from_millis(20), c.recv()).await.is_err());
        let _ = Hash::zero();
    }
}
