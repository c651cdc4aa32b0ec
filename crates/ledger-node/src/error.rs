//! Errors the TrustChain runner surfaces.

use thiserror::Error;

/// Errors arising from driving the ledger lifecycle. Algorithm-layer
/// errors (`Replay`) are recovered locally; data-integrity errors are
/// rejected at the boundary and logged — the runner never panics on
/// adversarial input.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Chain(#[from] ledger_chain::ChainError),

    #[error(transparent)]
    Network(#[from] ledger_network::NetworkError),

    #[error("message references an instance or round not yet opened; requeue it")]
    Replay,

    #[error("duplicate message, ignored: {0}")]
    Duplicate(&'static str),

    #[error("this node is not currently a promoter")]
    NotAPromoter,

    #[error("no consensus result recorded for round {0}")]
    MissingConsensus(u64),
}

pub type Result<T> = std::result::Result<T, NodeError>;
