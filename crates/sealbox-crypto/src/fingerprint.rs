//! SHA-256 ciphertext fingerprints
//!
//! The fingerprint is computed over `ciphertext ∥ tag` only, never over
//! the IV and never over plaintext. It travels as lowercase hex and
//! serves as an integrity receipt between client and server.

use crate::{CryptoError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Size of a SHA-256 digest in bytes
pub const FINGERPRINT_SIZE: usize = 32;

/// A SHA-256 fingerprint of a ciphertext
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    /// Compute the fingerprint of the given ciphertext bytes
    pub fn compute(ciphertext: &[u8]) -> Self {
        let digest = Sha256::digest(ciphertext);
        let mut arr = [0u8; FINGERPRINT_SIZE];
        arr.copy_from_slice(&digest);
        Self(arr)
    }

    /// Parse from a lowercase hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        if bytes.len() != FINGERPRINT_SIZE {
            return Err(CryptoError::InvalidLength(format!(
                "fingerprint must be {} bytes, got {}",
                FINGERPRINT_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; FINGERPRINT_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Get the digest bytes
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }

    /// Render as lowercase hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Check a ciphertext against this fingerprint
    pub fn matches(&self, ciphertext: &[u8]) -> bool {
        Self::compute(ciphertext) == *self
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = Fingerprint::compute(b"ciphertext bytes");
        let b = Fingerprint::compute(b"ciphertext bytes");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_detects_change() {
        let a = Fingerprint::compute(b"ciphertext bytes");
        let b = Fingerprint::compute(b"ciphertext bytez");
        assert_ne!(a, b);
        assert!(!a.matches(b"ciphertext bytez"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let fp = Fingerprint::compute(b"some data");
        let hex = fp.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex, hex.to_lowercase());
        assert_eq!(Fingerprint::from_hex(&hex).unwrap(), fp);
    }

    #[test]
    fn test_bad_hex_rejected() {
        assert!(Fingerprint::from_hex("abcd").is_err());
        assert!(Fingerprint::from_hex("not hex at all").is_err());
    }

    #[test]
    fn test_known_vector() {
        // SHA-256 of the empty string
        let fp = Fingerprint::compute(b"");
        assert_eq!(
            fp.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
