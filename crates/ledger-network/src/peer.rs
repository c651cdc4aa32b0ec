//! The peer table and the broadcast/gossip helpers that read it.
//!
//! Grounded on `MyFactory`'s `peers` dict and its `bcast`/`promoter_cast`/
//! `promoter_cast_t`/`non_promoter_cast`/`gossip` methods: each connection
//! owns an outbound channel, and these helpers just fan a message out to a
//! selected subset of the table.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use tokio::sync::mpsc;

use shared_types::NodeId;

use crate::error::{NetworkError, Result};
use crate::message::Message;

/// A live connection's outbound half: a channel into the task that owns
/// the write side of its `TcpStream`.
pub type PeerHandle = mpsc::UnboundedSender<Message>;

/// Every peer this node currently has a live connection to. Mutated only
/// from the single-threaded event loop, per the node's concurrency model —
/// no internal locking.
#[derive(Default)]
pub struct PeerTable {
    peers: HashMap<NodeId, PeerHandle>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected peer's outbound handle.
    pub fn insert(&mut self, id: NodeId, handle: PeerHandle) {
        self.peers.insert(id, handle);
    }

    /// Drop a peer, typically on connection loss. In-flight algorithm
    /// state is untouched; missing votes from this peer are treated as
    /// silent Byzantine failures.
    pub fn remove(&mut self, id: &NodeId) {
        self.peers.remove(id);
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.peers.keys()
    }

    /// Send to one specific peer.
    pub fn send_to(&self, id: &NodeId, msg: Message) -> Result<()> {
        let handle = self
            .peers
            .get(id)
            .ok_or_else(|| NetworkError::PeerNotFound(id.to_string()))?;
        handle.send(msg).map_err(|_| NetworkError::ConnectionClosed)
    }

    /// Send to every known peer.
    pub fn broadcast(&self, msg: &Message) {
        for handle in self.peers.values() {
            let _ = handle.send(msg.clone());
        }
    }

    /// Send to every peer in `promoters`, skipping any this node has no
    /// live connection to.
    pub fn promoter_cast(&self, promoters: &[NodeId], msg: &Message) {
        for id in promoters {
            let _ = self.send_to(id, msg.clone());
        }
    }

    /// Send to a random sample of `t + 1` promoters — enough that at
    /// least one correct promoter receives it when at most `t` are
    /// Byzantine.
    pub fn promoter_cast_t(&self, promoters: &[NodeId], t: usize, msg: &Message) {
        let mut rng = rand::thread_rng();
        let sample_size = (t + 1).min(promoters.len());
        let sample: Vec<&NodeId> = promoters.choose_multiple(&mut rng, sample_size).collect();
        for id in sample {
            let _ = self.send_to(id, msg.clone());
        }
    }

    /// Send to every known peer that is not in `promoters`.
    pub fn non_promoter_cast(&self, promoters: &[NodeId], msg: &Message) {
        for id in self.peers.keys() {
            if !promoters.contains(id) {
                let _ = self.send_to(id, msg.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(byte: u8) -> NodeId {
        NodeId::new([byte; 32])
    }

    #[test]
    fn broadcast_reaches_every_registered_peer() {
        let mut table = PeerTable::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        table.insert(node(1), tx1);
        table.insert(node(2), tx2);

        table.broadcast(&Message::Dummy);

        assert_eq!(rx1.try_recv().unwrap(), Message::Dummy);
        assert_eq!(rx2.try_recv().unwrap(), Message::Dummy);
    }

    #[test]
    fn non_promoter_cast_skips_promoters() {
        let mut table = PeerTable::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        table.insert(node(1), tx1);
        table.insert(node(2), tx2);

        table.non_promoter_cast(&[node(1)], &Message::Dummy);

        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), Message::Dummy);
    }

    #[test]
    fn remove_drops_a_peer() {
        let mut table = PeerTable::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        table.insert(node(1), tx);
        assert!(table.contains(&node(1)));
        table.remove(&node(1));
        assert!(!table.contains(&node(1)));
    }
}
