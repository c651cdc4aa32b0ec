//! # SHA-256 Hashing
//!
//! Content hashing and hash-pointer chaining for the ledger. SHA-256 is used
//! (rather than a faster hash) because the wire format and the signed
//! payloads it feeds into are specified in terms of SHA-256 digests.

use sha2::{Digest, Sha256};

/// SHA-256 hash output (256-bit).
pub type Hash = [u8; 32];

/// Stateful SHA-256 hasher, for incremental hashing of several fields.
pub struct Sha256Hasher {
    inner: Sha256,
}

impl Sha256Hasher {
    /// Create a new hasher.
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Feed more data in.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Consume the hasher and return the digest.
    pub fn finalize(self) -> Hash {
        self.inner.finalize().into()
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a single buffer.
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Hash the concatenation of several buffers, in order, without an
/// intermediate allocation.
pub fn sha256_many(inputs: &[&[u8]]) -> Hash {
    let mut hasher = Sha256Hasher::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize()
}

/// The all-zero hash used as the previous-hash pointer of a genesis block.
pub const ZERO_HASH: Hash = [0u8; 32];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_32_bytes() {
        assert_eq!(sha256(b"hello").len(), 32);
    }

    #[test]
    fn deterministic() {
        assert_eq!(sha256(b"same input"), sha256(b"same input"));
    }

    #[test]
    fn different_inputs_differ() {
        assert_ne!(sha256(b"a"), sha256(b"b"));
    }

    #[test]
    fn many_matches_concatenation() {
        let streamed = sha256_many(&[b"foo", b"bar"]);
        let concatenated = sha256(b"foobar");
        assert_eq!(streamed, concatenated);
    }
}
