//! Durable ledger store
//!
//! Every registry and ledger table lives in one `DbState` behind a
//! single writer lock. Mutations run against a working copy and are
//! snapshotted to disk (temp file, fsync, atomic rename) before the
//! in-memory state is replaced, so a crash mid-write never leaves a
//! partial share, a half-registered identity, or a dangling session.
//!
//! The store never holds plaintext, DEKs, or shared secrets: file rows
//! carry only ciphertext metadata and share rows carry opaque 800-byte
//! KEM payloads (base64).

use crate::error::{ApiError, ErrorKind, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Permission granted by a share
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Metadata and payload fetch only
    View,
    /// Payload fetch plus blob download
    Download,
    /// Download plus re-share
    Full,
}

impl Default for Permission {
    fn default() -> Self {
        Self::Download
    }
}

/// Role of a group member
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Owner,
    Admin,
    Member,
}

impl GroupRole {
    /// Whether this role may manage membership and create group shares
    pub fn can_manage(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

/// A registered identity
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub researcher_id: String,
    /// Argon2id PHC string; never the password itself
    pub password_hash: String,
    /// Kyber-512 public key, base64 (800 bytes decoded)
    pub public_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A live bearer-token session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    pub researcher_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// A stored file: ciphertext metadata plus the owner's KEM payload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u64,
    pub owner: String,
    pub file_name: String,
    /// Plaintext length in bytes
    pub original_size: u64,
    /// Stored blob length: original_size + 28
    pub ciphertext_size: u64,
    pub content_type: String,
    /// Lowercase hex SHA-256 over `ciphertext ∥ tag`
    pub sha256_hash: String,
    /// Owner-wrap KEM payload, base64 (800 bytes decoded)
    pub owner_wrap: String,
    pub created_at: DateTime<Utc>,
}

/// A direct share: one file, one recipient, one wrapped key
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectShareRecord {
    pub id: u64,
    pub file_id: u64,
    pub sender: String,
    pub recipient: String,
    /// Recipient-wrap KEM payload, base64 (800 bytes decoded)
    pub payload: String,
    pub share_code: String,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub viewed: bool,
    pub revoked: bool,
}

/// One member's entry in a group share fan-out
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberWrap {
    /// KEM payload wrapped for this member, base64
    pub payload: String,
    pub viewed: bool,
}

/// A group share: one file fanned out to a member → payload mapping
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupShareRecord {
    pub id: u64,
    pub file_id: u64,
    pub group_id: u64,
    pub sender: String,
    /// member-id → wrapped payload, fixed at fan-out time
    pub wraps: HashMap<String, MemberWrap>,
    pub share_code: String,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub revoked: bool,
}

/// A named group of identities
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: u64,
    pub name: String,
    pub created_by: String,
    pub members: HashMap<String, GroupRole>,
    pub created_at: DateTime<Utc>,
}

impl GroupRecord {
    pub fn role_of(&self, researcher_id: &str) -> Option<GroupRole> {
        self.members.get(researcher_id).copied()
    }

    pub fn is_member(&self, researcher_id: &str) -> bool {
        self.members.contains_key(researcher_id)
    }
}

/// The full durable state
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DbState {
    pub identities: HashMap<String, IdentityRecord>,
    pub sessions: HashMap<String, SessionRecord>,
    pub files: BTreeMap<u64, FileRecord>,
    pub direct_shares: BTreeMap<u64, DirectShareRecord>,
    pub group_shares: BTreeMap<u64, GroupShareRecord>,
    pub groups: BTreeMap<u64, GroupRecord>,
    pub next_file_id: u64,
    pub next_share_id: u64,
    pub next_group_id: u64,
}

impl DbState {
    fn new() -> Self {
        Self {
            next_file_id: 1,
            next_share_id: 1,
            next_group_id: 1,
            ..Default::default()
        }
    }

    /// Whether a share-code is already in use by any live record
    pub fn code_in_use(&self, code: &str) -> bool {
        self.direct_shares.values().any(|s| s.share_code == code)
            || self.group_shares.values().any(|s| s.share_code == code)
    }
}

/// The durable store: one writer lock, snapshot-on-mutate
pub struct Db {
    state: RwLock<DbState>,
    path: Option<PathBuf>,
}

impl Db {
    /// Open a durable store backed by the given snapshot path
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let state = if path.exists() {
            let bytes = std::fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            DbState::new()
        };
        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    /// Open an in-memory store (tests and development)
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(DbState::new()),
            path: None,
        }
    }

    /// Run a read-only closure against the current state
    pub fn read<R>(&self, f: impl FnOnce(&DbState) -> R) -> R {
        f(&self.state.read())
    }

    /// Run a mutation transactionally
    ///
    /// The closure operates on a working copy; an `Err` return discards
    /// every change, and a persistence failure likewise leaves the
    /// in-memory state untouched. Writers are serialized by the lock.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut DbState) -> Result<R>) -> Result<R> {
        let mut guard = self.state.write();
        let mut working = guard.clone();
        let out = f(&mut working)?;
        self.persist(&working)?;
        *guard = working;
        Ok(out)
    }

    fn persist(&self, state: &DbState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| ApiError::Internal(format!("ledger serialization failed: {}", e)))?;

        let tmp = path.with_extension("json.tmp");
        {
            use std::io::Write;
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Shorthand for the precondition failures the ledger raises everywhere
pub fn not_found(what: &str) -> ApiError {
    ApiError::new(ErrorKind::NotFound, format!("{} not found", what))
}
