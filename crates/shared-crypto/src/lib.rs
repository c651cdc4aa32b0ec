//! # Shared Crypto
//!
//! Cryptographic primitives shared by the chain, consensus and network
//! crates.
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256 | Block hashing, hash-pointer chaining |
//! | `signatures` | Ed25519 | Block and message signing |
//! | `encoding` | bincode | Canonical encoding of signed payloads |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod errors;
pub mod hashing;
pub mod signatures;

pub use encoding::{canonical_encode, EncodingError};
pub use errors::CryptoError;
pub use hashing::{sha256, sha256_many, Hash, ZERO_HASH};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
