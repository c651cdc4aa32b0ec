//! The capability a MO14 instance needs to talk to the network, injected at
//! construction so the instance never holds a reference back to the node.

/// Broadcast primitives a single MO14 instance needs.
pub trait Mo14Egress {
    /// Send `EST_round(bit)` to every participant.
    fn broadcast_est(&mut self, round: u64, bit: bool);
    /// Send `AUX_round(bit)` to every participant.
    fn broadcast_aux(&mut self, round: u64, bit: bool);
}

/// An egress that only records what it was asked to send, for tests.
#[derive(Default)]
pub struct RecordingEgress {
    /// `(phase, round, bit)` triples in call order. Phase is "est" or
    /// "aux".
    pub sent: Vec<(&'static str, u64, bool)>,
}

impl Mo14Egress for RecordingEgress {
    fn broadcast_est(&mut self, round: u64, bit: bool) {
        self.sent.push(("est", round, bit));
    }

    fn broadcast_aux(&mut self, round: u64, bit: bool) {
        self.sent.push(("aux", round, bit));
    }
}
