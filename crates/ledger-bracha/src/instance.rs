//! A single Bracha reliable broadcast instance, for one `(sender,
//! instance-id)` pair.

use std::collections::HashMap;

use shared_types::NodeId;

use crate::egress::BrachaEgress;

/// The three message phases of Bracha's protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrachaMessage<V> {
    /// The designated sender's proposal.
    Init(V),
    /// An echo of a value, once a participant has seen `Init` or enough
    /// matching echoes.
    Echo(V),
    /// A ready vote, once a participant has seen enough matching echoes or
    /// ready votes.
    Ready(V),
}

/// What happened as a result of handling one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrachaEvent<V> {
    /// The message was processed; no new delivery.
    Continue,
    /// This instance delivered its value — happens exactly once.
    Delivered(V),
}

/// Network parameters every instance needs: total participants `n` and the
/// Byzantine fault bound `t` (`t < n/3`).
#[derive(Debug, Clone, Copy)]
pub struct BrachaParams {
    /// Total number of participants.
    pub n: usize,
    /// Maximum number of Byzantine participants tolerated.
    pub t: usize,
}

impl BrachaParams {
    /// `ceil((n + t + 1) / 2)`, the echo threshold.
    fn echo_threshold(&self) -> usize {
        (self.n + self.t + 1 + 1) / 2
    }

    /// `t + 1`, the threshold to echo a ready vote you haven't sent yet.
    fn ready_amplify_threshold(&self) -> usize {
        self.t + 1
    }

    /// `2t + 1`, the threshold to deliver.
    fn ready_deliver_threshold(&self) -> usize {
        2 * self.t + 1
    }
}

/// One Bracha reliable broadcast instance.
pub struct BrachaInstance<V: Clone + Eq + std::hash::Hash> {
    params: BrachaParams,
    self_id: NodeId,
    designated_sender: NodeId,
    init_received: bool,
    echo_senders: HashMap<NodeId, V>,
    echo_tally: HashMap<V, usize>,
    ready_senders: HashMap<NodeId, V>,
    ready_tally: HashMap<V, usize>,
    echo_sent: bool,
    ready_sent: bool,
    delivered: bool,
}

impl<V: Clone + Eq + std::hash::Hash> BrachaInstance<V> {
    /// Start a fresh instance for a broadcast from `designated_sender`,
    /// running from the local node identified by `self_id`.
    pub fn new(params: BrachaParams, self_id: NodeId, designated_sender: NodeId) -> Self {
        Self {
            params,
            self_id,
            designated_sender,
            init_received: false,
            echo_senders: HashMap::new(),
            echo_tally: HashMap::new(),
            ready_senders: HashMap::new(),
            ready_tally: HashMap::new(),
            echo_sent: false,
            ready_sent: false,
            delivered: false,
        }
    }

    /// Whether this instance has already delivered a value.
    pub fn has_delivered(&self) -> bool {
        self.delivered
    }

    /// Called by the designated sender to kick off the broadcast: sends
    /// `Init(v)` to everyone and locally treats it as having received it.
    pub fn propose(&mut self, v: V, egress: &mut impl BrachaEgress<V>) -> BrachaEvent<V> {
        egress.broadcast_init(&v);
        self.handle(self.designated_sender, BrachaMessage::Init(v), egress)
    }

    /// Process one message from `from`.
    pub fn handle(
        &mut self,
        from: NodeId,
        msg: BrachaMessage<V>,
        egress: &mut impl BrachaEgress<V>,
    ) -> BrachaEvent<V> {
        match msg {
            BrachaMessage::Init(v) => self.on_init(from, v, egress),
            BrachaMessage::Echo(v) => self.on_echo(from, v, egress),
            BrachaMessage::Ready(v) => self.on_ready(from, v, egress),
        }
    }

    fn on_init(&mut self, from: NodeId, v: V, egress: &mut impl BrachaEgress<V>) -> BrachaEvent<V> {
        if from != self.designated_sender || self.init_received {
            return BrachaEvent::Continue;
        }
        self.init_received = true;

        if !self.echo_sent {
            self.echo_sent = true;
            egress.broadcast_echo(&v);
            // Our own broadcast reaches us too; register it like any vote.
            return self.on_echo(self.self_id, v, egress);
        }
        BrachaEvent::Continue
    }

    fn on_echo(&mut self, from: NodeId, v: V, egress: &mut impl BrachaEgress<V>) -> BrachaEvent<V> {
        if self.echo_senders.contains_key(&from) {
            return BrachaEvent::Continue;
        }
        self.echo_senders.insert(from, v.clone());
        let count = {
            let c = self.echo_tally.entry(v.clone()).or_insert(0);
            *c += 1;
            *c
        };

        if count >= self.params.echo_threshold() && !self.ready_sent {
            self.ready_sent = true;
            egress.broadcast_ready(&v);
            return self.on_ready(self.self_id, v, egress);
        }
        BrachaEvent::Continue
    }

    fn on_ready(&mut self, from: NodeId, v: V, egress: &mut impl BrachaEgress<V>) -> BrachaEvent<V> {
        if self.ready_senders.contains_key(&from) {
            return BrachaEvent::Continue;
        }
        self.ready_senders.insert(from, v.clone());
        let count = {
            let c = self.ready_tally.entry(v.clone()).or_insert(0);
            *c += 1;
            *c
        };

        if count >= self.params.ready_amplify_threshold() && !self.ready_sent {
            self.ready_sent = true;
            egress.broadcast_ready(&v);
            let self_vote = self.register_own_ready(v.clone());
            if self_vote >= self.params.ready_deliver_threshold() && !self.delivered {
                self.delivered = true;
                return BrachaEvent::Delivered(v);
            }
        }

        if count >= self.params.ready_deliver_threshold() && !self.delivered {
            self.delivered = true;
            return BrachaEvent::Delivered(v);
        }
        BrachaEvent::Continue
    }

    /// Record our own ready vote without re-broadcasting (the broadcast
    /// already happened in the caller); returns the updated tally.
    fn register_own_ready(&mut self, v: V) -> usize {
        if self.ready_senders.contains_key(&self.self_id) {
            return *self.ready_tally.get(&v).unwrap_or(&0);
        }
        self.ready_senders.insert(self.self_id, v.clone());
        let c = self.ready_tally.entry(v).or_insert(0);
        *c += 1;
        *c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egress::RecordingEgress;

    fn node(byte: u8) -> NodeId {
        NodeId::new([byte; 32])
    }

    #[test]
    fn delivers_after_2t_plus_1_ready_votes() {
        let params = BrachaParams { n: 4, t: 1 };
        let sender = node(0);
        let mut instance: BrachaInstance<u8> = BrachaInstance::new(params, node(99), sender);
        let mut egress = RecordingEgress::default();

        // n=4,t=1: echo threshold = ceil(6/2) = 3.
        assert_eq!(
            instance.handle(sender, BrachaMessage::Init(7), &mut egress),
            BrachaEvent::Continue
        );
        assert!(matches!(
            instance.handle(node(1), BrachaMessage::Echo(7), &mut egress),
            BrachaEvent::Continue
        ));
        assert!(matches!(
            instance.handle(node(2), BrachaMessage::Echo(7), &mut egress),
            BrachaEvent::Continue
        ));
        // Third distinct echo crosses the echo threshold, should have
        // caused our own Ready(7) to be buffered in egress.
        instance.handle(node(3), BrachaMessage::Echo(7), &mut egress);
        assert!(egress.sent.iter().any(|(phase, v)| *phase == "ready" && *v == 7));

        // ready_deliver_threshold = 2*1+1 = 3.
        instance.handle(node(1), BrachaMessage::Ready(7), &mut egress);
        let result = instance.handle(node(2), BrachaMessage::Ready(7), &mut egress);
        assert_eq!(result, BrachaEvent::Delivered(7));
        assert!(instance.has_delivered());
    }

    #[test]
    fn duplicate_init_from_same_sender_is_ignored() {
        let params = BrachaParams { n: 4, t: 1 };
        let sender = node(0);
        let mut instance: BrachaInstance<u8> = BrachaInstance::new(params, node(99), sender);
        let mut egress = RecordingEgress::default();

        instance.handle(sender, BrachaMessage::Init(1), &mut egress);
        instance.handle(sender, BrachaMessage::Init(2), &mut egress);
        let echo_inits: usize = egress.sent.iter().filter(|(phase, _)| *phase == "echo").count();
        assert_eq!(echo_inits, 1);
    }

    #[test]
    fn delivers_only_once() {
        let params = BrachaParams { n: 4, t: 1 };
        let sender = node(0);
        let mut instance: BrachaInstance<u8> = BrachaInstance::new(params, node(99), sender);
        let mut egress = RecordingEgress::default();

        for i in 1..=3u8 {
            instance.handle(node(i), BrachaMessage::Ready(9), &mut egress);
        }
        assert!(instance.has_delivered());
        let result = instance.handle(node(4), BrachaMessage::Ready(9), &mut egress);
        assert_eq!(result, BrachaEvent::Continue);
    }
}
