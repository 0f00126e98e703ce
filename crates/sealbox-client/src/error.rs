//! Client error types

use thiserror::Error;

/// Result type alias using `ClientError`
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the sealbox client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error body
    #[error("api error {status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Cryptographic failure
    #[error("crypto error: {0}")]
    Crypto(#[from] sealbox_crypto::CryptoError),

    /// The local keystore holds no keypair for this identity
    #[error("no local keypair for {0}")]
    NoKeypair(String),

    /// The intended recipient has no registered public key
    #[error("{0} has no registered public key")]
    NoRecipientKey(String),

    /// Only the file owner can recover the DEK to re-share
    #[error("not the owner of file {0}")]
    NotOwner(u64),

    /// Not logged in
    #[error("not authenticated")]
    NotAuthenticated,

    /// Keystore IO failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Keystore serialization failure
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// The error code the server reported, if any
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Collapse to what an end user should see
    ///
    /// Every cryptographic failure reads as one message; the detailed
    /// kind stays available through `Display`/`Debug` for diagnostics.
    pub fn user_message(&self) -> String {
        match self {
            Self::Crypto(_) => "decryption failed".to_string(),
            Self::NoKeypair(_) => {
                "no decryption key on this device - restore your keystore or register a new key"
                    .to_string()
            }
            Self::NoRecipientKey(id) => format!("{} cannot receive shares yet", id),
            Self::NotOwner(_) => "only the owner can share this file".to_string(),
            Self::NotAuthenticated => "please log in".to_string(),
            Self::Api { message, .. } => message.clone(),
            Self::Http(_) => "could not reach the server".to_string(),
            Self::Io(_) | Self::Json(_) => "local storage error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_errors_collapse_for_users() {
        let tampered = ClientError::Crypto(sealbox_crypto::CryptoError::Tampered);
        let bad_payload =
            ClientError::Crypto(sealbox_crypto::CryptoError::BadPayload("len".into()));

        assert_eq!(tampered.user_message(), "decryption failed");
        assert_eq!(bad_payload.user_message(), "decryption failed");
        // Diagnostics keep the distinction
        assert_ne!(tampered.to_string(), bad_payload.to_string());
    }
}
