//! The validation-aware wrapper around a node's [`Chain`]: tracks agreed
//! consensus results by round, caches compact blocks learned from
//! counterparties, and decides a transaction's validity from the evidence
//! gathered so far.
//!
//! Ported from `trustchain.py`'s `TrustChain` class.

use std::collections::HashMap;

use shared_crypto::Ed25519KeyPair;
use shared_types::{Hash, PublicKey};

use ledger_chain::{Chain, CompactBlock, Cons, CpBlock, Signature, TxBlock, Validity};

use crate::error::Result;

/// Checks that `blocks[i].inner.prev == blocks[i-1].hash()` for every
/// `i > 0` — the hash-pointer chaining a piece of compact blocks must
/// satisfy to be trusted as a contiguous slice of someone's chain.
pub fn hash_pointers_ok(blocks: &[CompactBlock]) -> bool {
    blocks.windows(2).all(|w| w[1].inner.prev == w[0].hash())
}

/// A node's chain plus everything needed to resolve transaction validity:
/// which consensus round agreed on which checkpoints, and a growing cache
/// of each counterparty's compact blocks.
pub struct TrustChain {
    chain: Chain,
    consensus: HashMap<u64, Cons>,
    other_chains: HashMap<PublicKey, Vec<Option<CompactBlock>>>,
}

impl TrustChain {
    pub fn new(keypair: &Ed25519KeyPair) -> Self {
        Self {
            chain: Chain::new(keypair),
            consensus: HashMap::new(),
            other_chains: HashMap::new(),
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn next_seq(&self) -> u64 {
        self.chain.blocks().len() as u64
    }

    pub fn new_tx(&mut self, tx: TxBlock) -> Result<()> {
        Ok(self.chain.append_tx(tx)?)
    }

    /// Attach a counterparty's half to the local transaction at `seq`.
    pub fn attach_other_half(&mut self, seq: u64, other: ledger_chain::TxHalf) -> Result<()> {
        Ok(self.chain.attach_other_half(seq, other)?)
    }

    /// Record that a validation request for the transaction at `seq` was
    /// just sent, at the given consensus round.
    pub fn mark_validation_requested(&mut self, seq: u64, round: u64) -> Result<()> {
        Ok(self.chain.mark_validation_requested(seq, round)?)
    }

    /// Record a freshly agreed consensus result and append the checkpoint
    /// that cites it.
    #[allow(clippy::too_many_arguments)]
    pub fn new_cp(
        &mut self,
        p: bool,
        cons: Cons,
        ss: Vec<Signature>,
        vks: &[PublicKey],
        t: usize,
        keypair: &Ed25519KeyPair,
    ) -> Result<CpBlock> {
        let round = cons.round;
        let seq = self.next_seq();
        let prev = self.chain.latest_compact_hash();
        let cp = CpBlock::new(prev, seq, &cons, p, keypair, ss, vks, t)?;
        if !self.consensus.contains_key(&round) {
            self.consensus.insert(round, cons);
        }
        self.chain.append_cp(cp)?;
        Ok(self.chain.latest_cp().clone())
    }

    /// Learn a consensus result agreed by promoters, without constructing a
    /// checkpoint of our own that cites it. Idempotent.
    pub fn record_consensus(&mut self, cons: Cons) {
        self.consensus.entry(cons.round).or_insert(cons);
    }

    /// The consensus round whose agreed set contains `cp`, if any.
    pub fn consensus_round_of_cp(&self, cp: &CpBlock) -> Option<u64> {
        let cp_hash = cp.hash();
        (cp.round()..=self.chain.latest_round()).find(|r| {
            self.consensus
                .get(r)
                .is_some_and(|cons| cons.blocks.iter().any(|b| b.hash() == cp_hash))
        })
    }

    /// Whether `compact`'s hash appears among round `r`'s agreed
    /// checkpoints' compact projections.
    pub fn compact_cp_in_consensus(&self, compact: &CompactBlock, r: i64) -> bool {
        if r < 0 {
            return false;
        }
        match self.consensus.get(&(r as u64)) {
            Some(cons) => cons.blocks.iter().any(|b| b.compact().hash() == compact.hash()),
            None => false,
        }
    }

    pub fn pieces(&self, seq: u64) -> Vec<CompactBlock> {
        self.chain.pieces(seq)
    }

    /// The nearest enclosing checkpoints on each side of `seq` that also
    /// have a resolved consensus round, plus those rounds. `-1` for a round
    /// that wasn't found, mirroring the reference's sentinel.
    fn agreed_enclosure(&self, seq: u64) -> (Option<&CpBlock>, Option<&CpBlock>, i64, i64) {
        let mut cp_a = None;
        let mut r_a = -1i64;
        let mut idx = seq as i64 - 1;
        while idx >= 0 {
            if let Some(cp) = self.chain.get(idx as u64).and_then(|b| b.as_cp()) {
                if let Some(r) = self.consensus_round_of_cp(cp) {
                    cp_a = Some(cp);
                    r_a = r as i64;
                    break;
                }
            }
            idx -= 1;
        }

        let mut cp_b = None;
        let mut r_b = -1i64;
        let mut idx = seq + 1;
        while idx < self.chain.blocks().len() as u64 {
            if let Some(cp) = self.chain.get(idx).and_then(|b| b.as_cp()) {
                if let Some(r) = self.consensus_round_of_cp(cp) {
                    cp_b = Some(cp);
                    r_b = r as i64;
                    break;
                }
            }
            idx += 1;
        }

        (cp_a, cp_b, r_a, r_b)
    }

    /// The compact-block slice enclosing `seq`'s transaction, annotated
    /// with the consensus rounds that agreed on each endpoint. Empty
    /// unless both endpoints have a resolved round.
    pub fn agreed_pieces(&self, seq: u64) -> Vec<CompactBlock> {
        let (cp_a, cp_b, r_a, r_b) = self.agreed_enclosure(seq);
        let (Some(a), Some(b)) = (cp_a, cp_b) else {
            return Vec::new();
        };
        if r_a == -1 || r_b == -1 {
            return Vec::new();
        }
        let (start, end) = (a.seq() as usize, b.seq() as usize);
        let mut blocks: Vec<CompactBlock> =
            self.chain.blocks()[start..=end].iter().map(|b| b.compact()).collect();
        if let Some(first) = blocks.first_mut() {
            first.agreed_round = r_a;
        }
        if let Some(last) = blocks.last_mut() {
            last.agreed_round = r_b;
        }
        blocks
    }

    /// Pull a verification piece for `seq` out of the counterparty cache,
    /// if the cache already spans a pair of agreed endpoints around it.
    pub fn load_cache_for_verification(&self, seq: u64) -> Vec<CompactBlock> {
        let Some(tx) = self.chain.get(seq).and_then(|b| b.as_tx()) else {
            return Vec::new();
        };
        let Some(other) = &tx.other_half else {
            return Vec::new();
        };

        let Some(cache) = self.other_chains.get(&tx.half.inner.counterparty) else {
            return Vec::new();
        };
        let other_seq = other.inner.seq as usize;
        if cache.len() <= other_seq || cache[other_seq].is_none() {
            return Vec::new();
        }

        let mut idx_a: Option<usize> = None;
        let mut i = other_seq;
        while i > 0 {
            i -= 1;
            match &cache[i] {
                None => return Vec::new(),
                Some(block) if block.agreed_round != -1 => {
                    idx_a = Some(i);
                    break;
                }
                Some(_) => {}
            }
        }

        let mut idx_b: Option<usize> = None;
        for (i, block) in cache.iter().enumerate().skip(other_seq + 1) {
            match block {
                None => return Vec::new(),
                Some(block) if block.agreed_round != -1 => {
                    idx_b = Some(i);
                    break;
                }
                Some(_) => {}
            }
        }

        match (idx_a, idx_b) {
            (Some(a), Some(b)) => cache[a..=b].iter().filter_map(|b| b.clone()).collect(),
            _ => Vec::new(),
        }
    }

    /// Decide `seq`'s validity against a piece of compact blocks received
    /// from (or on behalf of) its counterparty.
    pub fn verify_tx(&mut self, seq: u64, compact_blocks: &[CompactBlock], use_cache: bool) -> Validity {
        let Some(tx) = self.chain.get(seq).and_then(|b| b.as_tx()) else {
            return Validity::Unknown;
        };
        let counterparty = tx.half.inner.counterparty;
        let Some(other) = tx.other_half.clone() else {
            return Validity::Unknown;
        };
        if compact_blocks.is_empty() {
            return Validity::Unknown;
        }

        let peer_cp_a = &compact_blocks[0];
        let peer_cp_b = &compact_blocks[compact_blocks.len() - 1];
        let r_a = peer_cp_a.agreed_round;
        let r_b = peer_cp_b.agreed_round;

        if !(self.compact_cp_in_consensus(peer_cp_a, r_a) && self.compact_cp_in_consensus(peer_cp_b, r_b)) {
            return Validity::Unknown;
        }
        if !hash_pointers_ok(compact_blocks) {
            return Validity::Unknown;
        }

        let other_compact_hash = other.compact().hash();
        if compact_blocks.iter().any(|b| b.hash() == other_compact_hash) {
            let _ = self.chain.set_validity(seq, Validity::Valid);
            if use_cache {
                let updated = self.cache_compact_blocks(counterparty, compact_blocks);
                if updated {
                    self.verify_from_cache(counterparty);
                }
            }
            return Validity::Valid;
        }

        Validity::Unknown
    }

    /// Merge `compact_blocks` into the cache kept for `counterparty`.
    /// Returns whether any new entry was written.
    fn cache_compact_blocks(&mut self, counterparty: PublicKey, compact_blocks: &[CompactBlock]) -> bool {
        let cache = self.other_chains.entry(counterparty).or_default();
        let mut updated = false;
        for block in compact_blocks {
            let idx = block.seq as usize;
            if cache.len() <= idx {
                cache.resize(idx + 1, None);
            }
            match &cache[idx] {
                None => {
                    cache[idx] = Some(block.clone());
                    updated = true;
                }
                Some(existing) => {
                    debug_assert!(existing.hash() == block.hash(), "cached compact block changed");
                }
            }
        }
        updated
    }

    /// Re-check every still-unknown transaction with `counterparty` now
    /// that its cache grew — called right after a cache update.
    fn verify_from_cache(&mut self, counterparty: PublicKey) {
        let seqs: Vec<u64> = self
            .get_verifiable_txs()
            .into_iter()
            .filter(|tx| tx.half.inner.counterparty == counterparty)
            .map(|tx| tx.seq())
            .collect();
        for seq in seqs {
            let pieces = self.load_cache_for_verification(seq);
            self.verify_tx(seq, &pieces, false);
        }
    }

    /// Transactions that are actually worth attempting to verify right
    /// now: ones old enough that consensus has moved past their enclosure,
    /// and not already blocked on an in-flight validation request.
    pub fn get_verifiable_txs(&self) -> Vec<&TxBlock> {
        let latest_round = self.chain.latest_round();
        if latest_round < 2 {
            return Vec::new();
        }
        let Some(max_h) = self.chain.get_cp_of_round(latest_round - 1).map(|cp| cp.seq()) else {
            return Vec::new();
        };
        self.chain
            .unknown_txs()
            .filter(|tx| tx.seq() < max_h && tx.request_sent_r < latest_round as i64)
            .collect()
    }

    pub fn get_validated_txs(&self) -> Vec<&TxBlock> {
        self.chain.validated_txs().collect()
    }

    pub fn latest_round(&self) -> u64 {
        self.chain.latest_round()
    }

    pub fn latest_hash(&self) -> Hash {
        self.chain.latest_hash()
    }

    pub fn latest_compact_hash(&self) -> Hash {
        self.chain.latest_compact_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_pointers_ok_accepts_a_contiguous_chain() {
        let a = CompactBlock::new([1u8; 32], [0u8; 32], 0);
        let b = CompactBlock::new([2u8; 32], a.hash(), 1);
        assert!(hash_pointers_ok(&[a, b]));
    }

    #[test]
    fn hash_pointers_ok_rejects_a_gap() {
        let a = CompactBlock::new([1u8; 32], [0u8; 32], 0);
        let b = CompactBlock::new([2u8; 32], [9u8; 32], 1);
        assert!(!hash_pointers_ok(&[a, b]));
    }

    #[test]
    fn new_tx_then_verify_tx_with_no_pieces_is_unknown() {
        let kp = Ed25519KeyPair::generate();
        let mut tc = TrustChain::new(&kp);
        let tx = TxBlock::new(tc.latest_compact_hash(), 1, [9u8; 32], b"hi".to_vec(), [0u8; 32], &kp);
        tc.new_tx(tx).unwrap();
        assert_eq!(tc.verify_tx(1, &[], true), Validity::Unknown);
    }

    #[test]
    fn get_verifiable_txs_is_empty_before_round_two() {
        let kp = Ed25519KeyPair::generate();
        let tc = TrustChain::new(&kp);
        assert!(tc.get_verifiable_txs().is_empty());
    }
}
