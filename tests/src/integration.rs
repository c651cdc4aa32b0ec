//! Two independent [`TrustChain`]s, driven directly (no network, no ACS),
//! standing in for a pair of promoters that have already agreed on
//! everything ACS would otherwise produce. Exercises the transaction
//! handshake and the validation outcome rules end to end.

use ledger_chain::{Cons, CpBlock, Signature, TxBlock};
use ledger_node::TrustChain;
use shared_crypto::Ed25519KeyPair;
use shared_types::PublicKey;

struct Pair {
    a: Ed25519KeyPair,
    b: Ed25519KeyPair,
    vks: Vec<PublicKey>,
    tc_a: TrustChain,
    tc_b: TrustChain,
}

impl Pair {
    fn new() -> Self {
        let a = Ed25519KeyPair::generate();
        let b = Ed25519KeyPair::generate();
        let vks = vec![*a.public_key().as_bytes(), *b.public_key().as_bytes()];
        let tc_a = TrustChain::new(&a);
        let tc_b = TrustChain::new(&b);
        Self { a, b, vks, tc_a, tc_b }
    }

    /// Append a checkpoint citing `cons` to both chains, as if both `a` and
    /// `b` had already signed it. Returns `(cp_a, cp_b)`.
    fn checkpoint_round(&mut self, cons: Cons) -> (CpBlock, CpBlock) {
        let cons_hash = cons.hash();
        let ss = vec![Signature::new(&self.a, &cons_hash), Signature::new(&self.b, &cons_hash)];
        let cp_a = self
            .tc_a
            .new_cp(true, cons.clone(), ss.clone(), &self.vks, 0, &self.a)
            .expect("checkpoint for a");
        let cp_b = self.tc_b.new_cp(true, cons, ss, &self.vks, 0, &self.b).expect("checkpoint for b");
        (cp_a, cp_b)
    }

    /// Append and cross-attach a bilateral transaction at the current
    /// height on both chains (which stay the same height throughout this
    /// harness, since every step runs on both sides in lockstep).
    fn transact(&mut self, nonce: [u8; 32], payload: &[u8]) {
        let seq = self.tc_a.next_seq();
        assert_eq!(seq, self.tc_b.next_seq(), "harness keeps both chains at equal height");

        let b_pub = *self.b.public_key().as_bytes();
        let a_pub = *self.a.public_key().as_bytes();

        let tx_a = TxBlock::new(self.tc_a.latest_compact_hash(), seq, b_pub, payload.to_vec(), nonce, &self.a);
        let tx_b = TxBlock::new(self.tc_b.latest_compact_hash(), seq, a_pub, payload.to_vec(), nonce, &self.b);

        self.tc_a.new_tx(tx_a.clone()).expect("append a's half");
        self.tc_b.new_tx(tx_b.clone()).expect("append b's half");

        self.tc_a.attach_other_half(seq, tx_b.half).expect("a learns b's half");
        self.tc_b.attach_other_half(seq, tx_a.half).expect("b learns a's half");
    }
}

/// After a bilateral handshake, each side's `other_half` is bit-for-bit the
/// counterparty's own signed half.
#[test]
fn transaction_handshake_pair_matches_exactly() {
    let mut pair = Pair::new();
    pair.checkpoint_round(Cons::new(1, vec![]));
    pair.transact([0u8; 32], b"tx");

    let seq = pair.tc_a.next_seq() - 1;
    let a_tx = pair.tc_a.chain().get(seq).unwrap().as_tx().unwrap();
    let b_tx = pair.tc_b.chain().get(seq).unwrap().as_tx().unwrap();

    assert_eq!(a_tx.other_half.as_ref().unwrap().inner, b_tx.half.inner);
    assert_eq!(b_tx.other_half.as_ref().unwrap().inner, a_tx.half.inner);
}

/// A transaction enclosed by two checkpoints that have themselves since
/// been cited as agreed (one round later, in the next `Cons`) resolves to
/// `Valid` once the counterparty's piece is presented; one still waiting on
/// that follow-on round of agreement stays `Unknown`.
#[test]
fn validation_resolves_once_both_enclosing_checkpoints_are_agreed() {
    let mut pair = Pair::new();

    let (cp_a1, cp_b1) = pair.checkpoint_round(Cons::new(1, vec![]));
    pair.transact([7u8; 32], b"payment");
    let tx_seq = pair.tc_a.next_seq() - 1;

    // Round 2 agrees on round 1's checkpoints, but round 1's own enclosing
    // checkpoint on the *far* side of the transaction (built just below)
    // hasn't itself been agreed on yet: still Unknown.
    let (cp_a2, cp_b2) = pair.checkpoint_round(Cons::new(2, vec![cp_a1, cp_b1]));
    let pieces_so_far = pair.tc_a.agreed_pieces(tx_seq);
    assert!(pieces_so_far.is_empty());
    assert_eq!(pair.tc_b.verify_tx(tx_seq, &pieces_so_far, false), ledger_chain::Validity::Unknown);

    // Round 3 agrees on round 2's checkpoints, which finally resolves the
    // far enclosing checkpoint's round too.
    pair.checkpoint_round(Cons::new(3, vec![cp_a2, cp_b2]));
    let pieces = pair.tc_a.agreed_pieces(tx_seq);
    assert!(!pieces.is_empty());

    assert_eq!(pair.tc_b.verify_tx(tx_seq, &pieces, false), ledger_chain::Validity::Valid);
    // Idempotent: a second presentation of the same evidence doesn't change
    // an already-resolved verdict.
    assert_eq!(pair.tc_b.verify_tx(tx_seq, &pieces, false), ledger_chain::Validity::Valid);
}
