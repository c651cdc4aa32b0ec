//! Signatures over block digests.
//!
//! Every block carries its author's verification key alongside the
//! signature so that a receiver holding only the block (no separate
//! out-of-band key lookup) can check it — and so that `verify_signatures`
//! can filter a signature set down to the ones from a known promoter set.

use serde::{Deserialize, Serialize};
use shared_crypto::{sha256, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use shared_types::{PublicKey, Signature as RawSignature};

use crate::error::{ChainError, Result};

/// A detached Ed25519 signature paired with the signer's verification key.
#[derive(Clone, PartialEq, Eq, std::hash::Hash, Serialize, Deserialize)]
pub struct Signature {
    /// The signer's verification key.
    pub vk: PublicKey,
    /// Raw signature bytes.
    pub sig: RawSignature,
}

impl Signature {
    /// Sign `msg` with `keypair`, recording its public key alongside.
    pub fn new(keypair: &Ed25519KeyPair, msg: &[u8]) -> Self {
        Self {
            vk: *keypair.public_key().as_bytes(),
            sig: *keypair.sign(msg).as_bytes(),
        }
    }

    /// Verify that this signature was produced by `expected_vk` over `msg`.
    pub fn verify(&self, expected_vk: &PublicKey, msg: &[u8]) -> Result<()> {
        if &self.vk != expected_vk {
            return Err(ChainError::SignatureVerificationFailure);
        }
        let vk = Ed25519PublicKey::from_bytes(self.vk)
            .map_err(|_| ChainError::SignatureVerificationFailure)?;
        vk.verify(msg, &Ed25519Signature::from_bytes(self.sig))
            .map_err(|_| ChainError::SignatureVerificationFailure)
    }
}

/// Check that strictly more than `t` of `ss` are valid signatures over
/// `msg`, restricting attention to signers in `vks`.
///
/// Both the raw count (`|ss|`) and the promoter-filtered count (`|ss'|`)
/// must already exceed `t`: a signature set padded with non-promoters to
/// clear the raw threshold is still rejected.
pub fn verify_signatures(msg: &[u8], ss: &[Signature], vks: &[PublicKey], t: usize) -> Result<()> {
    let filtered: Vec<&Signature> = ss.iter().filter(|s| vks.contains(&s.vk)).collect();

    if ss.len() <= t {
        return Err(ChainError::InsufficientSignatures { oks: ss.len(), t });
    }
    if filtered.len() <= t {
        return Err(ChainError::InsufficientSignatures {
            oks: filtered.len(),
            t,
        });
    }

    let oks = filtered.iter().filter(|s| s.verify(&s.vk, msg).is_ok()).count();
    if oks <= t {
        return Err(ChainError::InsufficientSignatures { oks, t });
    }
    Ok(())
}

/// Hash `msg` the way every signed block digest is hashed before signing.
pub fn digest(msg: &[u8]) -> shared_types::Hash {
    sha256(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let kp = Ed25519KeyPair::generate();
        let sig = Signature::new(&kp, b"hello");
        assert!(sig.verify(kp.public_key().as_bytes(), b"hello").is_ok());
    }

    #[test]
    fn wrong_key_fails() {
        let kp = Ed25519KeyPair::generate();
        let other = Ed25519KeyPair::generate();
        let sig = Signature::new(&kp, b"hello");
        assert!(sig
            .verify(other.public_key().as_bytes(), b"hello")
            .is_err());
    }

    #[test]
    fn threshold_rejects_too_few_signatures() {
        let kp = Ed25519KeyPair::generate();
        let vk = *kp.public_key().as_bytes();
        let sig = Signature::new(&kp, b"m");
        // t=1 requires strictly more than 1 signature.
        assert!(verify_signatures(b"m", &[sig], &[vk], 1).is_err());
    }

    #[test]
    fn threshold_ignores_non_promoter_signatures() {
        let promoter = Ed25519KeyPair::generate();
        let outsider = Ed25519KeyPair::generate();
        let vks = vec![*promoter.public_key().as_bytes()];
        let ss = vec![
            Signature::new(&promoter, b"m"),
            Signature::new(&outsider, b"m"),
        ];
        // Only 1 promoter signature among 2 total; t=0 needs > 0 after filtering, which holds,
        // but t=1 needs > 1 filtered signatures, which fails even though |ss| = 2 > 1.
        assert!(verify_signatures(b"m", &ss, &vks, 1).is_err());
        assert!(verify_signatures(b"m", &ss, &vks, 0).is_ok());
    }
}
