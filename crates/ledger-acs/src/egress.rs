//! The capability an ACS instance needs to talk to the network: the same
//! Bracha/MO14 broadcasts, tagged with which of the `n` parallel instances
//! they belong to.

use ledger_bracha::BrachaEgress;
use ledger_mo14::Mo14Egress;

/// Broadcast primitives one ACS run needs, across its `n` Bracha proposal
/// broadcasts and `n` MO14 inclusion-vote agreements.
pub trait AcsEgress<V> {
    fn broadcast_bracha_init(&mut self, proposer: usize, v: &V);
    fn broadcast_bracha_echo(&mut self, proposer: usize, v: &V);
    fn broadcast_bracha_ready(&mut self, proposer: usize, v: &V);
    fn broadcast_mo14_est(&mut self, ba: usize, round: u64, bit: bool);
    fn broadcast_mo14_aux(&mut self, ba: usize, round: u64, bit: bool);
}

/// Adapts an [`AcsEgress`] into the [`BrachaEgress`] one specific proposal
/// broadcast instance expects.
pub(crate) struct BrachaAdapter<'a, V, E> {
    pub egress: &'a mut E,
    pub proposer: usize,
    pub _marker: std::marker::PhantomData<V>,
}

impl<'a, V, E: AcsEgress<V>> BrachaEgress<V> for BrachaAdapter<'a, V, E> {
    fn broadcast_init(&mut self, v: &V) {
        self.egress.broadcast_bracha_init(self.proposer, v);
    }

    fn broadcast_echo(&mut self, v: &V) {
        self.egress.broadcast_bracha_echo(self.proposer, v);
    }

    fn broadcast_ready(&mut self, v: &V) {
        self.egress.broadcast_bracha_ready(self.proposer, v);
    }
}

/// Adapts an [`AcsEgress`] into the [`Mo14Egress`] one specific inclusion
/// vote instance expects.
pub(crate) struct Mo14Adapter<'a, V, E> {
    pub egress: &'a mut E,
    pub ba: usize,
    pub _marker: std::marker::PhantomData<V>,
}

impl<'a, V, E: AcsEgress<V>> Mo14Egress for Mo14Adapter<'a, V, E> {
    fn broadcast_est(&mut self, round: u64, bit: bool) {
        self.egress.broadcast_mo14_est(self.ba, round, bit);
    }

    fn broadcast_aux(&mut self, round: u64, bit: bool) {
        self.egress.broadcast_mo14_aux(self.ba, round, bit);
    }
}

/// An egress that only records what it was asked to send, for tests.
#[derive(Default)]
pub struct RecordingEgress<V> {
    pub bracha_sent: Vec<(&'static str, usize, V)>,
    pub mo14_sent: Vec<(&'static str, usize, u64, bool)>,
}

impl<V: Clone> AcsEgress<V> for RecordingEgress<V> {
    fn broadcast_bracha_init(&mut self, proposer: usize, v: &V) {
        self.bracha_sent.push(("init", proposer, v.clone()));
    }

    fn broadcast_bracha_echo(&mut self, proposer: usize, v: &V) {
        self.bracha_sent.push(("echo", proposer, v.clone()));
    }

    fn broadcast_bracha_ready(&mut self, proposer: usize, v: &V) {
        self.bracha_sent.push(("ready", proposer, v.clone()));
    }

    fn broadcast_mo14_est(&mut self, ba: usize, round: u64, bit: bool) {
        self.mo14_sent.push(("est", ba, round, bit));
    }

    fn broadcast_mo14_aux(&mut self, ba: usize, round: u64, bit: bool) {
        self.mo14_sent.push(("aux", ba, round, bit));
    }
}
