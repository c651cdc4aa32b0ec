//! # Shared Types
//!
//! Primitive types (hashes, keys, signatures, node ids) shared by every
//! crate in the workspace. Domain entities live in the crate that owns them
//! (`ledger-chain`, `ledger-bracha`, `ledger-mo14`, `ledger-acs`); this crate
//! only holds the vocabulary they're all built out of.

pub mod entities;

pub use entities::{Hash, NodeId, PublicKey, Signature};
