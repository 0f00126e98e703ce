//! Symmetric key material
//!
//! The DEK/KEM architecture separates payload encryption from key
//! distribution: a random DEK encrypts exactly one file, and the DEK is
//! wrapped per-recipient by the KEM layer in [`crate::wrap`].

use crate::{CryptoError, DEK_SIZE, IV_SIZE, Result, SHARED_SECRET_SIZE};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A data-encryption key for AES-256-GCM
///
/// Lives only transiently in client memory: during encrypt, re-share,
/// or decrypt. Wiped on drop on every exit path including unwind.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Dek {
    key: [u8; DEK_SIZE],
}

impl Dek {
    /// Generate a new random DEK
    ///
    /// Fails if the OS randomness source fails; there is no
    /// deterministic fallback.
    pub fn generate() -> Result<Self> {
        let mut key = [0u8; DEK_SIZE];
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|e| CryptoError::Rng(e.to_string()))?;
        Ok(Self { key })
    }

    /// Create a DEK from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != DEK_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "DEK must be {} bytes, got {}",
                DEK_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; DEK_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; DEK_SIZE] {
        &self.key
    }
}

impl std::fmt::Debug for Dek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dek([REDACTED])")
    }
}

/// A 96-bit AES-GCM initialization vector
///
/// Must be fresh per encryption; reuse under the same key breaks GCM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Iv {
    bytes: [u8; IV_SIZE],
}

impl Iv {
    /// Generate a random IV
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; IV_SIZE];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::Rng(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != IV_SIZE {
            return Err(CryptoError::InvalidLength(format!(
                "IV must be {} bytes, got {}",
                IV_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; IV_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the IV bytes
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.bytes
    }

    /// Encode as base64
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(self.bytes)
    }

    /// Decode from base64
    pub fn from_base64(s: &str) -> Result<Self> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD.decode(s)?;
        Self::from_bytes(&bytes)
    }
}

/// A Kyber shared secret
///
/// Consumed by exactly one XOR wrap and then discarded; never derived
/// from, never reused across recipients.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    bytes: [u8; SHARED_SECRET_SIZE],
}

impl SharedSecret {
    pub(crate) fn new(bytes: [u8; SHARED_SECRET_SIZE]) -> Self {
        Self { bytes }
    }

    /// Get the secret bytes
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedSecret([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dek_generation_is_random() {
        let dek1 = Dek::generate().unwrap();
        let dek2 = Dek::generate().unwrap();
        assert_ne!(dek1.as_bytes(), dek2.as_bytes());
    }

    #[test]
    fn test_dek_wrong_length_rejected() {
        assert!(Dek::from_bytes(&[0u8; 16]).is_err());
        assert!(Dek::from_bytes(&[0u8; 33]).is_err());
        assert!(Dek::from_bytes(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_iv_base64_roundtrip() {
        let iv = Iv::generate().unwrap();
        let decoded = Iv::from_base64(&iv.to_base64()).unwrap();
        assert_eq!(iv, decoded);
    }

    #[test]
    fn test_iv_uniqueness() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            let iv = Iv::generate().unwrap();
            assert!(seen.insert(iv.as_bytes().to_vec()), "IV collision detected!");
        }
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let dek = Dek::generate().unwrap();
        assert_eq!(format!("{:?}", dek), "Dek([REDACTED])");
    }
}
