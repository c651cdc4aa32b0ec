//! The append-only, hash-chained sequence of blocks a single node owns.

use shared_crypto::Ed25519KeyPair;
use shared_types::Hash;

use crate::block::{generate_genesis_block, Block, CompactBlock, CpBlock, TxBlock, Validity};
use crate::error::{ChainError, Result};

/// A node's own append-only chain: a genesis checkpoint followed by an
/// interleaving of transaction halves and checkpoints.
pub struct Chain {
    blocks: Vec<Block>,
    tx_count: usize,
    cp_count: usize,
    latest_cp_index: usize,
}

impl Chain {
    /// Start a fresh chain rooted at a freshly generated genesis block.
    pub fn new(keypair: &Ed25519KeyPair) -> Self {
        let genesis = generate_genesis_block(keypair);
        Self {
            blocks: vec![Block::Cp(genesis)],
            tx_count: 0,
            cp_count: 0,
            latest_cp_index: 0,
        }
    }

    /// Append a transaction half-block.
    ///
    /// Requires `tx.prev == latest_compact_hash()` and
    /// `tx.seq() == len(chain)`.
    pub fn append_tx(&mut self, tx: TxBlock) -> Result<()> {
        let expected_prev = self.latest_compact_hash();
        let expected_seq = self.blocks.len() as u64;
        if tx.prev() != expected_prev {
            return Err(ChainError::InvariantViolation(
                "tx.prev does not match latest compact hash".into(),
            ));
        }
        if tx.seq() != expected_seq {
            return Err(ChainError::InvariantViolation(format!(
                "tx.seq {} != expected {}",
                tx.seq(),
                expected_seq
            )));
        }
        self.blocks.push(Block::Tx(tx));
        self.tx_count += 1;
        Ok(())
    }

    /// Append a checkpoint block.
    ///
    /// Requires hash/seq chaining, plus `cp.round() > latest_cp().round()`.
    pub fn append_cp(&mut self, cp: CpBlock) -> Result<()> {
        let expected_prev = self.latest_compact_hash();
        let expected_seq = self.blocks.len() as u64;
        if cp.prev() != expected_prev {
            return Err(ChainError::InvariantViolation(
                "cp.prev does not match latest compact hash".into(),
            ));
        }
        if cp.seq() != expected_seq {
            return Err(ChainError::InvariantViolation(format!(
                "cp.seq {} != expected {}",
                cp.seq(),
                expected_seq
            )));
        }
        let prev_round = self.latest_cp().round();
        if cp.round() <= prev_round {
            return Err(ChainError::InvariantViolation(format!(
                "cp.round {} does not exceed previous round {}",
                cp.round(),
                prev_round
            )));
        }

        self.latest_cp_index = self.blocks.len();
        self.blocks.push(Block::Cp(cp));
        self.cp_count += 1;
        Ok(())
    }

    /// Every block appended so far, in order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The block at a given height.
    pub fn get(&self, seq: u64) -> Option<&Block> {
        self.blocks.get(seq as usize)
    }

    /// The genesis checkpoint.
    pub fn genesis(&self) -> &CpBlock {
        self.blocks[0].as_cp().expect("block 0 is always genesis")
    }

    /// The most recently appended checkpoint.
    pub fn latest_cp(&self) -> &CpBlock {
        self.blocks[self.latest_cp_index]
            .as_cp()
            .expect("latest_cp_index always names a CpBlock")
    }

    /// Hash of the compact projection of the last block.
    pub fn latest_compact_hash(&self) -> Hash {
        self.blocks.last().expect("chain always has genesis").compact().hash()
    }

    /// Hash of the last block's inner fields.
    pub fn latest_hash(&self) -> Hash {
        match self.blocks.last().expect("chain always has genesis") {
            Block::Tx(tx) => tx.hash(),
            Block::Cp(cp) => cp.hash(),
        }
    }

    /// The round of the most recent checkpoint.
    pub fn latest_round(&self) -> u64 {
        self.latest_cp().round()
    }

    /// Number of transaction halves appended.
    pub fn tx_count(&self) -> usize {
        self.tx_count
    }

    /// Number of checkpoints appended.
    pub fn cp_count(&self) -> usize {
        self.cp_count
    }

    /// The first checkpoint reporting on consensus round `r`, if any.
    pub fn get_cp_of_round(&self, r: u64) -> Option<&CpBlock> {
        self.blocks.iter().find_map(|b| match b {
            Block::Cp(cp) if cp.round() == r => Some(cp),
            _ => None,
        })
    }

    /// The checkpoint nearest the end of the chain.
    pub fn compute_latest_cp(&self) -> Result<&CpBlock> {
        self.blocks
            .iter()
            .rev()
            .find_map(Block::as_cp)
            .ok_or_else(|| ChainError::InvariantViolation("no CpBlock in chain".into()))
    }

    /// The pair of checkpoints enclosing the transaction at `seq`: the
    /// nearest checkpoint before it and the nearest one after. `None` if
    /// `seq` is not a transaction block, or either endpoint is missing.
    pub fn enclosure(&self, seq: u64) -> (Option<&CpBlock>, Option<&CpBlock>) {
        if self.blocks.get(seq as usize).and_then(Block::as_tx).is_none() {
            return (None, None);
        }
        let before = self.blocks[..seq as usize].iter().rev().find_map(Block::as_cp);
        let after = self.blocks[seq as usize + 1..].iter().find_map(Block::as_cp);
        (before, after)
    }

    /// The compact blocks `[A..=B]` where `A`/`B` are the enclosure of the
    /// transaction at `seq`; empty if either endpoint is missing.
    pub fn pieces(&self, seq: u64) -> Vec<CompactBlock> {
        let (a, b) = self.enclosure(seq);
        match (a, b) {
            (Some(a), Some(b)) => {
                let (start, end) = (a.seq() as usize, b.seq() as usize);
                self.blocks[start..=end].iter().map(Block::compact).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Attach a freshly received counterparty half to the local transaction
    /// at `seq`, verifying it matches and carries a valid signature.
    pub fn attach_other_half(&mut self, seq: u64, other: crate::block::TxHalf) -> Result<()> {
        let tx = self.blocks[seq as usize]
            .as_tx_mut()
            .ok_or(ChainError::NotATxBlock(seq))?;
        tx.add_other_half(other)
    }

    /// Mark the transaction at `seq` as valid or invalid. Idempotent: only
    /// takes effect if the current validity is still `Unknown`.
    pub fn set_validity(&mut self, seq: u64, validity: Validity) -> Result<()> {
        debug_assert!(validity != Validity::Unknown);
        let tx = self.blocks[seq as usize]
            .as_tx_mut()
            .ok_or(ChainError::NotATxBlock(seq))?;
        if tx.validity == Validity::Unknown {
            tx.validity = validity;
        }
        Ok(())
    }

    /// Record that a validation request for the transaction at `seq` was
    /// just sent, at the given consensus round — this is what
    /// `get_verifiable_txs`'s `request_sent_r` throttle reads to avoid
    /// re-asking every tick before the round has moved on.
    pub fn mark_validation_requested(&mut self, seq: u64, round: u64) -> Result<()> {
        let tx = self.blocks[seq as usize]
            .as_tx_mut()
            .ok_or(ChainError::NotATxBlock(seq))?;
        tx.request_sent_r = round as i64;
        Ok(())
    }

    /// Transaction blocks whose validity is still `Unknown` but whose
    /// counterparty half has been attached.
    pub fn unknown_txs(&self) -> impl Iterator<Item = &TxBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Tx(tx) if tx.validity == Validity::Unknown && tx.other_half.is_some() => {
                Some(tx)
            }
            _ => None,
        })
    }

    /// Transaction blocks whose validity has been resolved.
    pub fn validated_txs(&self) -> impl Iterator<Item = &TxBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Tx(tx) if tx.validity != Validity::Unknown => Some(tx),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Cons, TxBlock};

    fn promote_cp(chain: &Chain, keypair: &Ed25519KeyPair, round: u64) -> CpBlock {
        let cons = Cons::new(round, vec![]);
        CpBlock::new(
            chain.latest_compact_hash(),
            chain.blocks().len() as u64,
            &cons,
            true,
            keypair,
            vec![],
            &[],
            0,
        )
        .unwrap()
    }

    #[test]
    fn genesis_chain_starts_at_round_zero() {
        let kp = Ed25519KeyPair::generate();
        let chain = Chain::new(&kp);
        assert_eq!(chain.latest_round(), 0);
        assert_eq!(chain.cp_count(), 0);
        assert_eq!(chain.tx_count(), 0);
    }

    #[test]
    fn append_tx_then_cp_enforces_hash_and_seq_chaining() {
        let kp = Ed25519KeyPair::generate();
        let mut chain = Chain::new(&kp);

        let tx = TxBlock::new(
            chain.latest_compact_hash(),
            1,
            [9u8; 32],
            b"hi".to_vec(),
            [0u8; 32],
            &kp,
        );
        chain.append_tx(tx).unwrap();
        assert_eq!(chain.tx_count(), 1);

        let cp = promote_cp(&chain, &kp, 1);
        chain.append_cp(cp).unwrap();
        assert_eq!(chain.cp_count(), 1);
        assert_eq!(chain.latest_round(), 1);
    }

    #[test]
    fn append_cp_rejects_non_increasing_round() {
        let kp = Ed25519KeyPair::generate();
        let mut chain = Chain::new(&kp);
        let cp = CpBlock::new(
            chain.latest_compact_hash(),
            1,
            &Cons::new(0, vec![]),
            true,
            &kp,
            vec![],
            &[],
            0,
        )
        .unwrap();
        assert!(chain.append_cp(cp).is_err());
    }

    #[test]
    fn pieces_empty_without_both_endpoints() {
        let kp = Ed25519KeyPair::generate();
        let mut chain = Chain::new(&kp);
        let tx = TxBlock::new(
            chain.latest_compact_hash(),
            1,
            [9u8; 32],
            b"hi".to_vec(),
            [0u8; 32],
            &kp,
        );
        chain.append_tx(tx).unwrap();
        assert!(chain.pieces(1).is_empty());
    }

    #[test]
    fn pieces_spans_enclosing_checkpoints() {
        let kp = Ed25519KeyPair::generate();
        let mut chain = Chain::new(&kp);

        let cp1 = promote_cp(&chain, &kp, 1);
        chain.append_cp(cp1).unwrap();

        let tx = TxBlock::new(
            chain.latest_compact_hash(),
            2,
            [9u8; 32],
            b"hi".to_vec(),
            [0u8; 32],
            &kp,
        );
        chain.append_tx(tx).unwrap();

        let cp2 = promote_cp(&chain, &kp, 2);
        chain.append_cp(cp2).unwrap();

        let pieces = chain.pieces(2);
        assert_eq!(pieces.len(), 3);
    }

    #[test]
    fn set_validity_is_idempotent() {
        let kp = Ed25519KeyPair::generate();
        let mut chain = Chain::new(&kp);
        let mut tx = TxBlock::new(
            chain.latest_compact_hash(),
            1,
            [9u8; 32],
            b"hi".to_vec(),
            [0u8; 32],
            &kp,
        );
        let other = crate::block::TxHalf::new([9u8; 32], 0, *kp.public_key().as_bytes(), b"hi".to_vec(), [0u8; 32], &kp);
        tx.other_half = Some(other);
        chain.append_tx(tx).unwrap();

        chain.set_validity(1, Validity::Valid).unwrap();
        chain.set_validity(1, Validity::Invalid).unwrap();
        assert_eq!(chain.blocks()[1].as_tx().unwrap().validity, Validity::Valid);
    }
}
