//! Error taxonomy and HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Stable error kinds exposed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    BadCredentials,
    AlreadyExists,
    BadKey,
    NoRecipientKey,
    BadPayload,
    SizeMismatch,
    FingerprintMismatch,
    WeakPassword,
    InvalidInput,
    RateLimited,
    Internal,
}

impl ErrorKind {
    /// Get the error code string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "NotFound",
            Self::BadCredentials => "BadCredentials",
            Self::AlreadyExists => "AlreadyExists",
            Self::BadKey => "BadKey",
            Self::NoRecipientKey => "NoRecipientKey",
            Self::BadPayload => "BadPayload",
            Self::SizeMismatch => "SizeMismatch",
            Self::FingerprintMismatch => "FingerprintMismatch",
            Self::WeakPassword => "WeakPassword",
            Self::InvalidInput => "InvalidInput",
            Self::RateLimited => "RateLimited",
            Self::Internal => "Internal",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::BadCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists | Self::NoRecipientKey => StatusCode::CONFLICT,
            Self::BadKey
            | Self::BadPayload
            | Self::SizeMismatch
            | Self::FingerprintMismatch
            | Self::WeakPassword
            | Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{kind:?}: {message}")]
    Api {
        kind: ErrorKind,
        message: String,
        request_id: String,
    },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] sealbox_crypto::CryptoError),
}

impl From<crate::blobstore::BlobError> for ApiError {
    fn from(e: crate::blobstore::BlobError) -> Self {
        match e {
            crate::blobstore::BlobError::NotFound(id) => {
                ApiError::new(ErrorKind::NotFound, format!("blob {} not found", id))
            }
            crate::blobstore::BlobError::Io(e) => ApiError::Io(e),
        }
    }
}

impl ApiError {
    /// Create a new API error with the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Api {
            kind,
            message: message.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api { kind, .. } => *kind,
            Self::Internal(_) | Self::Io(_) => ErrorKind::Internal,
            Self::Crypto(e) => match e {
                sealbox_crypto::CryptoError::BadPayload(_) => ErrorKind::BadPayload,
                sealbox_crypto::CryptoError::InvalidKey(_) => ErrorKind::BadKey,
                sealbox_crypto::CryptoError::InvalidLength(_)
                | sealbox_crypto::CryptoError::DataTooLarge { .. }
                | sealbox_crypto::CryptoError::Base64Decode(_)
                | sealbox_crypto::CryptoError::HexDecode(_) => ErrorKind::InvalidInput,
                _ => ErrorKind::Internal,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = kind.status_code();
        let request_id = match &self {
            ApiError::Api { request_id, .. } => request_id.clone(),
            _ => uuid::Uuid::new_v4().to_string(),
        };

        // Internal details stay in the log, not on the wire
        let message = match &self {
            ApiError::Api { message, .. } => message.clone(),
            ApiError::Crypto(e) => e.to_string(),
            ApiError::Internal(_) | ApiError::Io(_) => {
                tracing::error!(error = %self, request_id = %request_id, "internal error");
                "internal server error".to_string()
            }
        };

        let body = serde_json::json!({
            "error": kind.as_str(),
            "message": message,
            "requestId": request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Result type alias using `ApiError`
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::BadCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::AlreadyExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::SizeMismatch.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_crypto_error_kinds() {
        let err = ApiError::from(sealbox_crypto::CryptoError::BadPayload("short".into()));
        assert_eq!(err.kind(), ErrorKind::BadPayload);

        let err = ApiError::from(sealbox_crypto::CryptoError::InvalidKey("len".into()));
        assert_eq!(err.kind(), ErrorKind::BadKey);
    }
}
