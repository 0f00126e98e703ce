//! Error types for the sealbox-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The operating system randomness source failed
    #[error("random number generation failed: {0}")]
    Rng(String),

    /// Encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Authentication failed on decrypt: tag mismatch or fingerprint
    /// mismatch. No plaintext is ever returned alongside this error.
    #[error("ciphertext authentication failed")]
    Tampered,

    /// A KEM payload had the wrong length or could not be decapsulated
    #[error("invalid KEM payload: {0}")]
    BadPayload(String),

    /// Invalid key format or length
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid IV or fingerprint length
    #[error("invalid length: {0}")]
    InvalidLength(String),

    /// Plaintext exceeds the maximum size accepted for encryption
    #[error("data too large: {size} bytes exceeds maximum {max} bytes")]
    DataTooLarge { size: u64, max: u64 },

    /// Base64 decode error
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Hex decode error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
