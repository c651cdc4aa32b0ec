//! The capability a Bracha instance needs to talk to the network, injected
//! at construction so the instance never holds a reference back to the
//! node that owns it.

/// Broadcast primitives a single Bracha instance needs.
pub trait BrachaEgress<V> {
    /// Send `Init(v)` to every participant — called once, by the
    /// designated sender only.
    fn broadcast_init(&mut self, v: &V);
    /// Send `Echo(v)` to every participant.
    fn broadcast_echo(&mut self, v: &V);
    /// Send `Ready(v)` to every participant.
    fn broadcast_ready(&mut self, v: &V);
}

/// An egress that only records what it was asked to send, for tests.
#[derive(Default)]
pub struct RecordingEgress<V> {
    /// `(phase, value)` pairs in call order. Phase is one of "init",
    /// "echo", "ready".
    pub sent: Vec<(&'static str, V)>,
}

impl<V: Clone> BrachaEgress<V> for RecordingEgress<V> {
    fn broadcast_init(&mut self, v: &V) {
        self.sent.push(("init", v.clone()));
    }

    fn broadcast_echo(&mut self, v: &V) {
        self.sent.push(("echo", v.clone()));
    }

    fn broadcast_ready(&mut self, v: &V) {
        self.sent.push(("ready", v.clone()));
    }
}
