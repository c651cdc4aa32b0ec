//! Canonical encoding for anything that gets hashed or signed.
//!
//! `bincode`'s fixed-width, field-order encoding gives every signer the same
//! bytes for the same value, which is what the hash-pointer chain and the
//! signature checks both depend on.

use serde::Serialize;
use thiserror::Error;

/// Failure to encode a value canonically.
#[derive(Debug, Error)]
#[error("canonical encoding failed: {0}")]
pub struct EncodingError(String);

/// Encode a value the same way every time, for hashing or signing.
pub fn canonical_encode<T: Serialize>(value: &T) -> Result<Vec<u8>, EncodingError> {
    bincode::serialize(value).map_err(|e| EncodingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Example {
        a: u64,
        b: String,
    }

    #[test]
    fn same_value_encodes_identically() {
        let v1 = Example { a: 1, b: "x".into() };
        let v2 = Example { a: 1, b: "x".into() };
        assert_eq!(canonical_encode(&v1).unwrap(), canonical_encode(&v2).unwrap());
    }
}
