//! Cross-crate integration tests for the TrustChain ledger: scenarios that
//! only make sense once `ledger-chain`, `ledger-node`, and (for the
//! handshake) two independent keypairs are wired together. Single-crate
//! behavior is covered by each crate's own `#[cfg(test)]` modules.

#[cfg(test)]
mod integration;
