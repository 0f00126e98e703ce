//! Identity & key registry
//!
//! Binds researcher identifiers to Kyber-512 public keys and gates
//! everything else behind bearer-token sessions. Login is
//! timing-neutral: unknown identifiers verify against a dummy verifier
//! so the work factor does not distinguish them from bad passwords.

use crate::config::ServerConfig;
use crate::error::{ApiError, ErrorKind, Result};
use crate::store::{Db, IdentityRecord, SessionRecord};
use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{PasswordHash, SaltString, rand_core::OsRng as SaltRng},
};
use chrono::{Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use std::sync::Arc;

/// What callers may see of an identity
#[derive(Clone, Debug, Serialize)]
pub struct IdentitySnapshot {
    pub researcher_id: String,
    pub has_public_key: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&IdentityRecord> for IdentitySnapshot {
    fn from(rec: &IdentityRecord) -> Self {
        Self {
            researcher_id: rec.researcher_id.clone(),
            has_public_key: rec.public_key.is_some(),
            created_at: rec.created_at,
        }
    }
}

/// One prefix-search hit
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityMatch {
    pub researcher_id: String,
    pub has_public_key: bool,
}

/// The identity & key registry service
#[derive(Clone)]
pub struct Registry {
    db: Arc<Db>,
    /// Verifier for a password nobody holds; keeps unknown-identifier
    /// logins on the same code path as wrong-password logins
    dummy_verifier: String,
    session_ttl: Duration,
    search_limit: usize,
    min_password_len: usize,
}

impl Registry {
    pub fn new(db: Arc<Db>, config: &ServerConfig) -> Result<Self> {
        let dummy_verifier = hash_password("sealbox-dummy-credential")?;
        Ok(Self {
            db,
            dummy_verifier,
            session_ttl: Duration::days(config.session_ttl_days),
            search_limit: config.search_limit,
            min_password_len: config.min_password_len,
        })
    }

    /// Create an identity and return a fresh session
    pub fn register(
        &self,
        researcher_id: &str,
        password: &str,
        public_key: Option<&[u8]>,
    ) -> Result<(String, IdentitySnapshot)> {
        validate_researcher_id(researcher_id)?;
        if password.chars().count() < self.min_password_len {
            return Err(ApiError::new(
                ErrorKind::WeakPassword,
                format!("password must be at least {} characters", self.min_password_len),
            ));
        }
        let public_key_b64 = public_key.map(encode_public_key).transpose()?;
        let password_hash = hash_password(password)?;

        let token = new_session_token()?;
        let snapshot = self.db.mutate(|state| {
            if state.identities.contains_key(researcher_id) {
                return Err(ApiError::new(
                    ErrorKind::AlreadyExists,
                    "identifier is already registered",
                ));
            }
            let now = Utc::now();
            let record = IdentityRecord {
                researcher_id: researcher_id.to_string(),
                password_hash: password_hash.clone(),
                public_key: public_key_b64.clone(),
                created_at: now,
            };
            let snapshot = IdentitySnapshot::from(&record);
            state.identities.insert(researcher_id.to_string(), record);
            state.sessions.insert(
                token.clone(),
                SessionRecord {
                    token: token.clone(),
                    researcher_id: researcher_id.to_string(),
                    created_at: now,
                    expires_at: now + self.session_ttl,
                },
            );
            Ok(snapshot)
        })?;

        tracing::info!(researcher_id = %researcher_id, "identity registered");
        Ok((token, snapshot))
    }

    /// Authenticate and mint a session
    pub fn login(&self, researcher_id: &str, password: &str) -> Result<(String, IdentitySnapshot)> {
        let stored = self
            .db
            .read(|s| s.identities.get(researcher_id).map(|r| r.password_hash.clone()));

        // Always run exactly one verification
        let verifier = stored.as_deref().unwrap_or(&self.dummy_verifier);
        let ok = verify_password(password, verifier) && stored.is_some();
        if !ok {
            return Err(ApiError::new(
                ErrorKind::BadCredentials,
                "invalid identifier or password",
            ));
        }

        let token = new_session_token()?;
        let snapshot = self.db.mutate(|state| {
            let record = state
                .identities
                .get(researcher_id)
                .ok_or_else(|| ApiError::new(ErrorKind::BadCredentials, "invalid identifier or password"))?;
            let snapshot = IdentitySnapshot::from(record);
            let now = Utc::now();
            state.sessions.insert(
                token.clone(),
                SessionRecord {
                    token: token.clone(),
                    researcher_id: researcher_id.to_string(),
                    created_at: now,
                    expires_at: now + self.session_ttl,
                },
            );
            Ok(snapshot)
        })?;

        tracing::debug!(researcher_id = %researcher_id, "login");
        Ok((token, snapshot))
    }

    /// Resolve a bearer token to an identity
    pub fn session(&self, token: &str) -> Result<IdentitySnapshot> {
        let session = self
            .db
            .read(|s| s.sessions.get(token).cloned())
            .ok_or_else(|| ApiError::new(ErrorKind::Unauthorized, "unknown session"))?;
        if session.is_expired() {
            return Err(ApiError::new(ErrorKind::Unauthorized, "session expired"));
        }
        self.db
            .read(|s| s.identities.get(&session.researcher_id).map(IdentitySnapshot::from))
            .ok_or_else(|| ApiError::new(ErrorKind::Unauthorized, "unknown session"))
    }

    /// Destroy a session
    pub fn logout(&self, token: &str) -> Result<()> {
        self.db.mutate(|state| {
            state.sessions.remove(token);
            Ok(())
        })
    }

    /// Overwrite the caller's registered public key
    pub fn set_public_key(&self, researcher_id: &str, public_key: &[u8]) -> Result<()> {
        let encoded = encode_public_key(public_key)?;
        self.db.mutate(|state| {
            let record = state
                .identities
                .get_mut(researcher_id)
                .ok_or_else(|| ApiError::new(ErrorKind::Unauthorized, "unknown identity"))?;
            record.public_key = Some(encoded.clone());
            Ok(())
        })?;
        tracing::info!(researcher_id = %researcher_id, "public key set");
        Ok(())
    }

    /// Look up a named identity's public key (base64)
    ///
    /// Leaks only that the identifier exists.
    pub fn lookup_public_key(&self, researcher_id: &str) -> Result<String> {
        self.db
            .read(|s| s.identities.get(researcher_id).and_then(|r| r.public_key.clone()))
            .ok_or_else(|| ApiError::new(ErrorKind::NotFound, "no public key registered"))
    }

    /// Case-sensitive prefix search over identifiers
    pub fn search(&self, prefix: &str) -> Vec<IdentityMatch> {
        let mut matches: Vec<IdentityMatch> = self.db.read(|s| {
            s.identities
                .values()
                .filter(|r| r.researcher_id.starts_with(prefix))
                .map(|r| IdentityMatch {
                    researcher_id: r.researcher_id.clone(),
                    has_public_key: r.public_key.is_some(),
                })
                .collect()
        });
        matches.sort_by(|a, b| a.researcher_id.cmp(&b.researcher_id));
        matches.truncate(self.search_limit);
        matches
    }
}

fn validate_researcher_id(researcher_id: &str) -> Result<()> {
    if researcher_id.is_empty() || researcher_id.chars().count() > 64 {
        return Err(ApiError::new(
            ErrorKind::InvalidInput,
            "identifier must be 1-64 characters",
        ));
    }
    if researcher_id.chars().any(|c| c.is_control()) {
        return Err(ApiError::new(
            ErrorKind::InvalidInput,
            "identifier must not contain control characters",
        ));
    }
    Ok(())
}

fn encode_public_key(bytes: &[u8]) -> Result<String> {
    if bytes.len() != sealbox_crypto::KYBER_PUBLIC_KEY_SIZE {
        return Err(ApiError::new(
            ErrorKind::BadKey,
            format!(
                "public key must be {} bytes, got {}",
                sealbox_crypto::KYBER_PUBLIC_KEY_SIZE,
                bytes.len()
            ),
        ));
    }
    use base64::Engine;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut SaltRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, verifier: &str) -> bool {
    PasswordHash::new(verifier)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn new_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| ApiError::Internal(format!("token generation failed: {}", e)))?;
    Ok(hex::encode(bytes))
}
