//! Block types: transaction halves, checkpoints, their compact projections,
//! and the consensus result a round of checkpoints agrees on.

use serde::{Deserialize, Serialize};
use shared_crypto::{canonical_encode, sha256_many, Ed25519KeyPair};
use shared_types::{Hash, PublicKey};

use crate::error::{ChainError, Result};
use crate::signature::{digest, verify_signatures, Signature};

/// The three states a transaction's validity can be in. Once it leaves
/// `Unknown` it never returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Not yet proven either way.
    Unknown,
    /// Proven to have an agreed enclosure matching the counterparty's half.
    Valid,
    /// Proven inconsistent with the counterparty's half.
    Invalid,
}

/// The immutable, signed part of a transaction half-block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBlockInner {
    /// Hash pointer to the previous compact block in the author's chain.
    pub prev: Hash,
    /// Height in the author's chain.
    pub seq: u64,
    /// The other party to this transaction.
    pub counterparty: PublicKey,
    /// Random nonce shared by both halves of the transaction.
    pub nonce: [u8; 32],
    /// Application payload, opaque to the chain.
    pub m: Vec<u8>,
}

/// One signed half of a bilateral transaction — either the copy an author
/// keeps in their own chain, or the copy received from a counterparty and
/// attached as `other_half`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHalf {
    /// The signed inner fields.
    pub inner: TxBlockInner,
    /// The author's signature over `sha256(inner)`.
    pub s: Signature,
}

impl TxHalf {
    /// Build and sign a new half-block.
    pub fn new(
        prev: Hash,
        seq: u64,
        counterparty: PublicKey,
        m: Vec<u8>,
        nonce: [u8; 32],
        keypair: &Ed25519KeyPair,
    ) -> Self {
        let inner = TxBlockInner {
            prev,
            seq,
            counterparty,
            nonce,
            m,
        };
        let encoded = canonical_encode(&inner).expect("TxBlockInner always encodes");
        let s = Signature::new(keypair, &digest(&encoded));
        Self { inner, s }
    }

    /// Hash of the inner fields — the value used as the compact block's
    /// digest and as the hash pointer the next block in the chain must cite.
    pub fn hash(&self) -> Hash {
        let encoded = canonical_encode(&self.inner).expect("TxBlockInner always encodes");
        digest(&encoded)
    }

    /// The public projection of this half, as handed to third parties
    /// during validation.
    pub fn compact(&self) -> CompactBlock {
        CompactBlock::new(self.hash(), self.inner.prev, self.inner.seq)
    }

    /// Verify this half was authored by `expected_vk`.
    pub fn verify_author(&self, expected_vk: &PublicKey) -> Result<()> {
        let encoded = canonical_encode(&self.inner).expect("TxBlockInner always encodes");
        self.s.verify(expected_vk, &digest(&encoded))
    }
}

/// A transaction block in the local chain: the author's own half, plus
/// whatever has been learned about the counterparty's matching half.
#[derive(Debug, Clone)]
pub struct TxBlock {
    /// The locally authored half.
    pub half: TxHalf,
    /// The counterparty's half, once received and verified.
    pub other_half: Option<TxHalf>,
    /// Current validity, monotonic once it leaves `Unknown`.
    pub validity: Validity,
    /// Consensus round a validation request was last sent at, or `-1`.
    pub request_sent_r: i64,
}

impl TxBlock {
    /// Build a new, unmatched transaction half-block.
    pub fn new(
        prev: Hash,
        seq: u64,
        counterparty: PublicKey,
        m: Vec<u8>,
        nonce: [u8; 32],
        keypair: &Ed25519KeyPair,
    ) -> Self {
        Self {
            half: TxHalf::new(prev, seq, counterparty, m, nonce, keypair),
            other_half: None,
            validity: Validity::Unknown,
            request_sent_r: -1,
        }
    }

    /// Height in the author's chain.
    pub fn seq(&self) -> u64 {
        self.half.inner.seq
    }

    /// Hash pointer to the previous block.
    pub fn prev(&self) -> Hash {
        self.half.inner.prev
    }

    /// Hash of this half's inner fields.
    pub fn hash(&self) -> Hash {
        self.half.hash()
    }

    /// The public projection of the local half.
    pub fn compact(&self) -> CompactBlock {
        self.half.compact()
    }

    /// Attach the counterparty's matching half, verifying it agrees on
    /// `(nonce, m)` and carries a valid signature by the counterparty.
    pub fn add_other_half(&mut self, other: TxHalf) -> Result<()> {
        if self.other_half.is_some() {
            return Err(ChainError::AlreadyMatched);
        }
        if self.half.inner.nonce != other.inner.nonce || self.half.inner.m != other.inner.m {
            return Err(ChainError::MismatchedHalves);
        }
        other.verify_author(&self.half.inner.counterparty)?;
        self.other_half = Some(other);
        Ok(())
    }
}

/// The immutable, signed part of a checkpoint block.
#[derive(Debug, Clone, PartialEq, Eq, std::hash::Hash, Serialize, Deserialize)]
pub struct CpBlockInner {
    /// Hash pointer to the previous compact block in the author's chain.
    pub prev: Hash,
    /// Height in the author's chain.
    pub seq: u64,
    /// The consensus round this checkpoint reports on.
    pub round: u64,
    /// Hash of the `Cons` this checkpoint's signatures attest to.
    pub cons_hash: Hash,
    /// Promoter signatures over `cons_hash` (at least `t+1` must verify).
    pub ss: Vec<Signature>,
    /// Whether the author wishes to be a promoter next round.
    pub p: bool,
}

/// A checkpoint block.
#[derive(Debug, Clone, PartialEq, Eq, std::hash::Hash, Serialize, Deserialize)]
pub struct CpBlock {
    /// The signed inner fields.
    pub inner: CpBlockInner,
    /// The author's signature over `sha256(inner)`.
    pub s: Signature,
}

impl CpBlock {
    /// Construct and sign a new checkpoint.
    ///
    /// Unless this is the genesis block (round 0, no signatures, no
    /// promoters known, seq 0), `ss` must contain more than `t` valid
    /// signatures by promoters in `vks` over `cons.hash()`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prev: Hash,
        seq: u64,
        cons: &Cons,
        p: bool,
        keypair: &Ed25519KeyPair,
        ss: Vec<Signature>,
        vks: &[PublicKey],
        t: usize,
    ) -> Result<Self> {
        let cons_hash = cons.hash();
        let is_genesis = cons.round == 0 && ss.is_empty() && vks.is_empty() && seq == 0;
        if !is_genesis {
            verify_signatures(&cons_hash, &ss, vks, t)?;
        }

        let inner = CpBlockInner {
            prev,
            seq,
            round: cons.round,
            cons_hash,
            ss,
            p,
        };
        let encoded = canonical_encode(&inner).expect("CpBlockInner always encodes");
        let s = Signature::new(keypair, &digest(&encoded));
        Ok(Self { inner, s })
    }

    /// Hash of this block's inner fields.
    pub fn hash(&self) -> Hash {
        let encoded = canonical_encode(&self.inner).expect("CpBlockInner always encodes");
        digest(&encoded)
    }

    /// Deterministic pseudo-random tiebreaker used for promoter ordering.
    pub fn luck(&self) -> Hash {
        sha256_many(&[&self.hash(), &self.s.vk])
    }

    /// Height in the author's chain.
    pub fn seq(&self) -> u64 {
        self.inner.seq
    }

    /// Hash pointer to the previous block.
    pub fn prev(&self) -> Hash {
        self.inner.prev
    }

    /// Consensus round this checkpoint reports on.
    pub fn round(&self) -> u64 {
        self.inner.round
    }

    /// The public projection of this checkpoint.
    pub fn compact(&self) -> CompactBlock {
        CompactBlock::new(self.hash(), self.inner.prev, self.inner.seq)
    }
}

/// The immutable part of a compact block: just enough to check hash-pointer
/// chaining without revealing the full block contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactBlockInner {
    /// Digest of the full block this compact block stands in for.
    pub digest: Hash,
    /// Hash pointer to the previous compact block.
    pub prev: Hash,
}

/// The public projection of a block, used as the unit of proof during
/// validation. `seq` and `agreed_round` are annotated after construction
/// (write-once in practice) and are deliberately excluded from the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactBlock {
    /// The hashed, immutable fields.
    pub inner: CompactBlockInner,
    /// Height in the author's chain.
    pub seq: u64,
    /// Consensus round in which this block's hash was seen agreed, or `-1`.
    pub agreed_round: i64,
}

impl CompactBlock {
    /// Build a fresh, not-yet-agreed compact block.
    pub fn new(digest: Hash, prev: Hash, seq: u64) -> Self {
        Self {
            inner: CompactBlockInner { digest, prev },
            seq,
            agreed_round: -1,
        }
    }

    /// Hash over the inner fields only — `seq` and `agreed_round` never
    /// affect it, since they are assigned after the fact.
    pub fn hash(&self) -> Hash {
        let encoded = canonical_encode(&self.inner).expect("CompactBlockInner always encodes");
        crate::signature::digest(&encoded)
    }
}

/// A set of checkpoints agreed by promoters in a given consensus round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cons {
    /// The consensus round.
    pub round: u64,
    /// The agreed checkpoint blocks, keyed implicitly by author.
    pub blocks: Vec<CpBlock>,
}

impl Cons {
    /// Build a new consensus result.
    pub fn new(round: u64, blocks: Vec<CpBlock>) -> Self {
        Self { round, blocks }
    }

    /// Hash of the whole agreed set — the digest promoters sign in the
    /// next checkpoint.
    pub fn hash(&self) -> Hash {
        let encoded = canonical_encode(self).expect("Cons always encodes");
        digest(&encoded)
    }

    /// Number of checkpoints in this round's agreed set.
    pub fn count(&self) -> usize {
        self.blocks.len()
    }

    /// The promoter set for the next round: among checkpoints with `p =
    /// true`, sorted ascending by luck, truncated to `n`.
    pub fn get_promoters(&self, n: usize) -> Vec<PublicKey> {
        let mut registered: Vec<&CpBlock> = self.blocks.iter().filter(|b| b.inner.p).collect();
        registered.sort_by_key(|b| b.luck());
        registered.into_iter().map(|b| b.s.vk).take(n).collect()
    }
}

/// Either kind of block a chain stores, in append order.
#[derive(Debug, Clone)]
pub enum Block {
    /// A transaction half-block.
    Tx(TxBlock),
    /// A checkpoint block.
    Cp(CpBlock),
}

impl Block {
    /// Height in the chain.
    pub fn seq(&self) -> u64 {
        match self {
            Block::Tx(tx) => tx.seq(),
            Block::Cp(cp) => cp.seq(),
        }
    }

    /// Hash pointer to the previous block.
    pub fn prev(&self) -> Hash {
        match self {
            Block::Tx(tx) => tx.prev(),
            Block::Cp(cp) => cp.prev(),
        }
    }

    /// The public projection of this block.
    pub fn compact(&self) -> CompactBlock {
        match self {
            Block::Tx(tx) => tx.compact(),
            Block::Cp(cp) => cp.compact(),
        }
    }

    /// Borrow as a transaction block, if it is one.
    pub fn as_tx(&self) -> Option<&TxBlock> {
        match self {
            Block::Tx(tx) => Some(tx),
            Block::Cp(_) => None,
        }
    }

    /// Mutably borrow as a transaction block, if it is one.
    pub fn as_tx_mut(&mut self) -> Option<&mut TxBlock> {
        match self {
            Block::Tx(tx) => Some(tx),
            Block::Cp(_) => None,
        }
    }

    /// Borrow as a checkpoint block, if it is one.
    pub fn as_cp(&self) -> Option<&CpBlock> {
        match self {
            Block::Cp(cp) => Some(cp),
            Block::Tx(_) => None,
        }
    }
}

/// Build the trivial checkpoint every chain starts with: round 0, empty
/// `Cons`, no signatures, flagged as a promoter.
pub fn generate_genesis_block(keypair: &Ed25519KeyPair) -> CpBlock {
    let prev = digest(b"0");
    let cons = Cons::new(0, vec![]);
    CpBlock::new(prev, 0, &cons, true, keypair, vec![], &[], 0)
        .expect("genesis construction cannot fail signature verification")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_has_expected_shape() {
        let kp = Ed25519KeyPair::generate();
        let genesis = generate_genesis_block(&kp);
        assert_eq!(genesis.seq(), 0);
        assert_eq!(genesis.round(), 0);
        assert!(genesis.inner.p);
    }

    #[test]
    fn compact_hash_ignores_mutable_fields() {
        let kp = Ed25519KeyPair::generate();
        let half = TxHalf::new([0u8; 32], 1, [1u8; 32], b"m".to_vec(), [0u8; 32], &kp);
        let mut a = half.compact();
        let mut b = half.compact();
        a.agreed_round = 5;
        b.seq = 99;
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn cpblock_new_rejects_insufficient_signatures() {
        let kp = Ed25519KeyPair::generate();
        let promoter = Ed25519KeyPair::generate();
        let cons = Cons::new(1, vec![]);
        let ss = vec![Signature::new(&promoter, &cons.hash())];
        let vks = vec![*promoter.public_key().as_bytes()];
        // t=1 requires > 1 signatures; only one is present.
        let result = CpBlock::new([0u8; 32], 1, &cons, false, &kp, ss, &vks, 1);
        assert!(result.is_err());
    }

    #[test]
    fn get_promoters_filters_and_orders_by_luck() {
        let kp = Ed25519KeyPair::generate();
        let cons_empty = Cons::new(0, vec![]);
        let mut blocks = vec![];
        for p in [true, false, true, true] {
            let cp = CpBlock::new([0u8; 32], 0, &cons_empty, p, &kp, vec![], &[], 0).unwrap();
            blocks.push(cp);
        }
        let cons = Cons::new(1, blocks);
        let promoters = cons.get_promoters(2);
        assert_eq!(promoters.len(), 2);
    }
}
