//! # Primitive Wire Types
//!
//! The handful of types every other crate in the workspace needs a name for:
//! hashes, keys, signatures, and a node identifier. Domain types built out of
//! these (blocks, consensus messages) live in the crates that own them.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// A 32-byte Ed25519 public key, doubling as a node's identity.
pub type PublicKey = [u8; 32];

/// A node's identity in the network, wrapping its verifying key.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(#[serde_as(as = "Bytes")] pub PublicKey);

impl NodeId {
    /// Build a node id from a raw verifying key.
    pub fn new(key: PublicKey) -> Self {
        Self(key)
    }

    /// The underlying verifying key bytes.
    pub fn as_bytes(&self) -> &PublicKey {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
