//! Wire types mirroring the server's JSON surface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Permission granted by a share
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    View,
    Download,
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

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterRequest {
    pub researcher_id: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginRequest {
    pub researcher_id: String,
    pub password: String,
}

/// Login/register result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub researcher_id: String,
    pub has_public_key: bool,
}

/// Current session snapshot
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub researcher_id: String,
    pub has_public_key: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SetPublicKeyRequest {
    pub public_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub researcher_id: String,
    pub public_key: String,
}

/// One identity prefix-search hit
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityMatch {
    pub researcher_id: String,
    pub has_public_key: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub identities: Vec<IdentityMatch>,
}

/// Server-side file metadata
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub file_id: u64,
    pub file_name: String,
    pub original_size: u64,
    pub ciphertext_size: u64,
    pub content_type: String,
    pub sha256_hash: String,
    /// Present for the owner only
    pub owner_wrap: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileListResponse {
    pub files: Vec<FileMeta>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateShareRequest {
    pub file_id: u64,
    pub recipient_id: String,
    pub payload: String,
    pub permission: Permission,
}

/// A freshly created share
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareCreated {
    pub share_id: u64,
    pub share_code: String,
}

/// The payload-bearing answer to fetch-by-code
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedShare {
    pub share_id: u64,
    pub file_id: u64,
    pub file_name: String,
    pub content_type: String,
    pub payload: String,
    pub permission: Permission,
    pub sender: String,
}

/// A share the caller created
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingShare {
    pub share_id: u64,
    pub share_code: String,
    pub file_id: u64,
    pub file_name: String,
    pub recipient: Option<String>,
    pub group_id: Option<u64>,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub viewed: bool,
    pub revoked: bool,
}

/// A share addressed to the caller
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingShare {
    pub share_id: u64,
    pub share_code: String,
    pub file_id: u64,
    pub file_name: String,
    pub content_type: String,
    pub sender: String,
    pub group_id: Option<u64>,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub viewed: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OutgoingResponse {
    pub shares: Vec<OutgoingShare>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IncomingResponse {
    pub shares: Vec<IncomingShare>,
}

/// One group member row
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub researcher_id: String,
    pub role: GroupRole,
}

/// A group the caller belongs to
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub group_id: u64,
    pub name: String,
    pub created_by: String,
    pub members: Vec<GroupMember>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupListResponse {
    pub groups: Vec<GroupInfo>,
}

/// A member with their registered public key
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberKey {
    pub researcher_id: String,
    pub role: GroupRole,
    pub public_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberKeysResponse {
    pub members: Vec<MemberKey>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateGroupRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddMemberRequest {
    pub researcher_id: String,
    pub role: GroupRole,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateGroupShareRequest {
    pub file_id: u64,
    pub payloads: HashMap<String, String>,
    pub permission: Permission,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupSharesResponse {
    pub shares: Vec<OutgoingShare>,
}

/// The server's JSON error body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// A decrypted received file
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    pub file_id: u64,
    pub file_name: String,
    pub content_type: String,
    pub permission: Permission,
    pub sender: String,
    pub plaintext: Vec<u8>,
}
