//! Error types for the chain data model.

use thiserror::Error;

/// Failures that can occur while building or appending to a [`crate::Chain`].
#[derive(Debug, Error)]
pub enum ChainError {
    /// A hash pointer, sequence number, or round number failed to chain.
    #[error("chain invariant violated: {0}")]
    InvariantViolation(String),

    /// A signature did not verify against the claimed key and message.
    #[error("signature verification failed")]
    SignatureVerificationFailure,

    /// Fewer than `t+1` promoter signatures verified over the consensus digest.
    #[error("insufficient signatures: {oks} verified, need > {t}")]
    InsufficientSignatures { oks: usize, t: usize },

    /// The block at the given index is not a `TxBlock`.
    #[error("block at seq {0} is not a transaction block")]
    NotATxBlock(u64),

    /// The block at the given index is not a `CpBlock`.
    #[error("block at seq {0} is not a checkpoint block")]
    NotACpBlock(u64),

    /// The two halves of a transaction disagree on nonce or payload.
    #[error("transaction halves do not match")]
    MismatchedHalves,

    /// An `other_half` was already attached; a second attempt is a no-op,
    /// not a retry.
    #[error("other half already attached")]
    AlreadyMatched,
}

/// Convenience alias for chain crate results.
pub type Result<T> = std::result::Result<T, ChainError>;
