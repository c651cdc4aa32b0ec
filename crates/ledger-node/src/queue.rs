//! The request/replay queue: messages the routing layer cannot yet process
//! (a Bracha/MO14/ACS instance or round not yet live) wait here until a
//! later tick.
//!
//! Ported from `MyFactory.process_queue`: a `LoopingCall` drains exactly
//! `qsize` entries — the queue length *at the start of the tick* — each
//! second. Re-deferred messages go back on the tail, where the next tick's
//! `qsize` won't see them. Preserve this exactly: draining until the queue
//! is merely empty (rather than capping at the start-of-tick size) would
//! spin forever on a message whose round never opens, blocking everything
//! behind it.

use std::collections::VecDeque;

use shared_types::NodeId;

use ledger_network::Message;

/// One deferred `(sender, message)` pair.
pub type QueuedMessage = (NodeId, Message);

/// A FIFO of messages whose context wasn't live yet when they first
/// arrived.
#[derive(Default)]
pub struct ReplayQueue {
    inner: VecDeque<QueuedMessage>,
}

impl ReplayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a message to the tail, to be retried on a future tick.
    pub fn push(&mut self, from: NodeId, msg: Message) {
        self.inner.push_back((from, msg));
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drain up to the queue's length *at the moment this is called* (not
    /// re-read per iteration), handing each entry to `handle`. If `handle`
    /// decides a message still isn't ready, it should push it back via
    /// [`ReplayQueue::push`] — such re-deferrals land after the cutoff and
    /// so are left for the next tick.
    pub fn drain_one_tick(&mut self, mut handle: impl FnMut(NodeId, Message, &mut ReplayQueue)) {
        let qsize = self.inner.len();
        for _ in 0..qsize {
            let Some((from, msg)) = self.inner.pop_front() else {
                break;
            };
            handle(from, msg, self);
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
    fn drains_exactly_the_size_observed_at_tick_start() {
        let mut queue = ReplayQueue::new();
        queue.push(node(1), Message::Dummy);
        queue.push(node(2), Message::Dummy);

        let mut processed = 0;
        queue.drain_one_tick(|_, _, requeue| {
            processed += 1;
            // Every handled message immediately re-defers itself, which
            // would spin forever if the drain loop re-read queue length.
            requeue.push(node(9), Message::Dummy);
        });

        assert_eq!(processed, 2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn empty_queue_drains_nothing() {
        let mut queue = ReplayQueue::new();
        let mut processed = 0;
        queue.drain_one_tick(|_, _, _| processed += 1);
        assert_eq!(processed, 0);
    }
}
