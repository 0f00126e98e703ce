//! Share ledger
//!
//! Records (recipient, wrapped-key payload) tuples per file and
//! enforces the read/revoke lifecycle. Payloads are opaque 800-byte
//! units the server never unwraps. A direct share moves
//! `active → revoked` and never back; revocation is authorization only,
//! a recipient who already fetched the payload keeps what they have.

use crate::error::{ApiError, ErrorKind, Result};
use crate::store::{Db, DirectShareRecord, GroupShareRecord, MemberWrap, Permission, not_found};
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use sealbox_crypto::KemPayload;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Length of a share-code in hex characters
///
/// A lookup handle, not a secret: the payload it names is useless
/// without the recipient's private key.
pub const SHARE_CODE_LEN: usize = 6;

/// What a recipient gets back from fetch-by-code
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedShare {
    pub share_id: u64,
    pub file_id: u64,
    pub file_name: String,
    pub content_type: String,
    /// The caller's wrapped payload, base64
    pub payload: String,
    pub permission: Permission,
    pub sender: String,
}

/// A share as listed to its creator
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingShare {
    pub share_id: u64,
    pub share_code: String,
    pub file_id: u64,
    pub file_name: String,
    /// Direct recipient, or None for a group fan-out
    pub recipient: Option<String>,
    pub group_id: Option<u64>,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub viewed: bool,
    pub revoked: bool,
}

/// A share as listed to an addressed recipient
#[derive(Clone, Debug, Serialize)]
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

/// The share ledger service
#[derive(Clone)]
pub struct ShareLedger {
    db: Arc<Db>,
}

impl ShareLedger {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Record a direct share
    ///
    /// The sender must own the file; the payload must be a well-formed
    /// 800-byte KEM payload. Returns the share id and its code.
    pub fn share_direct(
        &self,
        sender: &str,
        file_id: u64,
        recipient: &str,
        payload: &[u8],
        permission: Permission,
    ) -> Result<(u64, String)> {
        KemPayload::from_bytes(payload)?;
        let payload_b64 = {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD.encode(payload)
        };

        self.db.mutate(|state| {
            let file = state.files.get(&file_id).ok_or_else(|| not_found("file"))?;
            if file.owner != sender {
                return Err(ApiError::new(
                    ErrorKind::Forbidden,
                    "only the owner may share a file",
                ));
            }
            if !state.identities.contains_key(recipient) {
                return Err(not_found("recipient"));
            }
            if recipient == sender {
                return Err(ApiError::new(
                    ErrorKind::InvalidInput,
                    "cannot share a file with yourself",
                ));
            }

            let share_code = fresh_share_code(state)?;
            let id = state.next_share_id;
            state.next_share_id += 1;

            state.direct_shares.insert(
                id,
                DirectShareRecord {
                    id,
                    file_id,
                    sender: sender.to_string(),
                    recipient: recipient.to_string(),
                    payload: payload_b64.clone(),
                    share_code: share_code.clone(),
                    permission,
                    created_at: Utc::now(),
                    viewed: false,
                    revoked: false,
                },
            );

            tracing::info!(share_id = id, file_id, recipient = %recipient, "direct share created");
            Ok((id, share_code))
        })
    }

    /// Record a group fan-out share
    ///
    /// All-or-nothing: every payload must be well-formed, every mapped
    /// member must be a current group member with a registered public
    /// key, or nothing is recorded. Members absent from the mapping
    /// simply remain without access.
    pub fn share_group(
        &self,
        sender: &str,
        file_id: u64,
        group_id: u64,
        payloads: &HashMap<String, Vec<u8>>,
        permission: Permission,
    ) -> Result<(u64, String)> {
        if payloads.is_empty() {
            return Err(ApiError::new(
                ErrorKind::InvalidInput,
                "a group share needs at least one payload",
            ));
        }
        for payload in payloads.values() {
            KemPayload::from_bytes(payload)?;
        }

        self.db.mutate(|state| {
            let file = state.files.get(&file_id).ok_or_else(|| not_found("file"))?;
            if file.owner != sender {
                return Err(ApiError::new(
                    ErrorKind::Forbidden,
                    "only the owner may share a file",
                ));
            }
            let group = state.groups.get(&group_id).ok_or_else(|| not_found("group"))?;
            if !group.role_of(sender).is_some_and(|r| r.can_manage()) {
                return Err(ApiError::new(
                    ErrorKind::Forbidden,
                    "group shares require an admin or owner role",
                ));
            }
            for member in payloads.keys() {
                if !group.is_member(member) {
                    return Err(ApiError::new(
                        ErrorKind::InvalidInput,
                        format!("{} is not a member of this group", member),
                    ));
                }
                let has_key = state
                    .identities
                    .get(member)
                    .is_some_and(|i| i.public_key.is_some());
                if !has_key {
                    return Err(ApiError::new(
                        ErrorKind::NoRecipientKey,
                        format!("{} has no registered public key", member),
                    ));
                }
            }

            let share_code = fresh_share_code(state)?;
            let id = state.next_share_id;
            state.next_share_id += 1;

            let wraps = payloads
                .iter()
                .map(|(member, payload)| {
                    use base64::Engine;
                    (
                        member.clone(),
                        MemberWrap {
                            payload: base64::engine::general_purpose::STANDARD.encode(payload),
                            viewed: false,
                        },
                    )
                })
                .collect();

            state.group_shares.insert(
                id,
                GroupShareRecord {
                    id,
                    file_id,
                    group_id,
                    sender: sender.to_string(),
                    wraps,
                    share_code: share_code.clone(),
                    permission,
                    created_at: Utc::now(),
                    revoked: false,
                },
            );

            tracing::info!(share_id = id, file_id, group_id, members = payloads.len(), "group share created");
            Ok((id, share_code))
        })
    }

    /// Fetch a wrapped payload by share-code
    ///
    /// Answers only the addressed recipient (direct) or a current group
    /// member with a payload entry; everyone else sees `NotFound`, the
    /// same as a revoked or absent code. Flips the caller's viewed flag
    /// on first fetch; idempotent afterwards.
    pub fn fetch_by_code(&self, caller: &str, code: &str) -> Result<FetchedShare> {
        self.db.mutate(|state| {
            let direct_id = state
                .direct_shares
                .values()
                .find(|s| s.share_code == code && !s.revoked && s.recipient == caller)
                .map(|s| s.id);

            if let Some(id) = direct_id {
                let file_meta = {
                    let share = &state.direct_shares[&id];
                    state.files.get(&share.file_id).cloned()
                };
                let file = file_meta.ok_or_else(|| not_found("share"))?;
                let share = state.direct_shares.get_mut(&id).expect("checked above");
                share.viewed = true;
                return Ok(FetchedShare {
                    share_id: share.id,
                    file_id: share.file_id,
                    file_name: file.file_name,
                    content_type: file.content_type,
                    payload: share.payload.clone(),
                    permission: share.permission,
                    sender: share.sender.clone(),
                });
            }

            let group_id = state
                .group_shares
                .values()
                .find(|s| {
                    s.share_code == code
                        && !s.revoked
                        && s.wraps.contains_key(caller)
                        && state
                            .groups
                            .get(&s.group_id)
                            .is_some_and(|g| g.is_member(caller))
                })
                .map(|s| s.id);

            if let Some(id) = group_id {
                let file_meta = {
                    let share = &state.group_shares[&id];
                    state.files.get(&share.file_id).cloned()
                };
                let file = file_meta.ok_or_else(|| not_found("share"))?;
                let share = state.group_shares.get_mut(&id).expect("checked above");
                let wrap = share.wraps.get_mut(caller).expect("checked above");
                wrap.viewed = true;
                return Ok(FetchedShare {
                    share_id: share.id,
                    file_id: share.file_id,
                    file_name: file.file_name,
                    content_type: file.content_type,
                    payload: wrap.payload.clone(),
                    permission: share.permission,
                    sender: share.sender.clone(),
                });
            }

            Err(not_found("share"))
        })
    }

    /// Shares the caller has created, newest last
    pub fn list_outgoing(&self, owner: &str) -> Vec<OutgoingShare> {
        self.db.read(|state| {
            let mut out: Vec<OutgoingShare> = state
                .direct_shares
                .values()
                .filter(|s| s.sender == owner)
                .map(|s| OutgoingShare {
                    share_id: s.id,
                    share_code: s.share_code.clone(),
                    file_id: s.file_id,
                    file_name: file_name_of(state, s.file_id),
                    recipient: Some(s.recipient.clone()),
                    group_id: None,
                    permission: s.permission,
                    created_at: s.created_at,
                    viewed: s.viewed,
                    revoked: s.revoked,
                })
                .collect();
            out.extend(state.group_shares.values().filter(|s| s.sender == owner).map(|s| {
                OutgoingShare {
                    share_id: s.id,
                    share_code: s.share_code.clone(),
                    file_id: s.file_id,
                    file_name: file_name_of(state, s.file_id),
                    recipient: None,
                    group_id: Some(s.group_id),
                    permission: s.permission,
                    created_at: s.created_at,
                    viewed: s.wraps.values().any(|w| w.viewed),
                    revoked: s.revoked,
                }
            }));
            out.sort_by_key(|s| s.share_id);
            out
        })
    }

    /// Active shares addressed to the caller
    pub fn list_incoming(&self, recipient: &str) -> Vec<IncomingShare> {
        self.db.read(|state| {
            let mut incoming: Vec<IncomingShare> = state
                .direct_shares
                .values()
                .filter(|s| s.recipient == recipient && !s.revoked)
                .map(|s| IncomingShare {
                    share_id: s.id,
                    share_code: s.share_code.clone(),
                    file_id: s.file_id,
                    file_name: file_name_of(state, s.file_id),
                    content_type: content_type_of(state, s.file_id),
                    sender: s.sender.clone(),
                    group_id: None,
                    permission: s.permission,
                    created_at: s.created_at,
                    viewed: s.viewed,
                })
                .collect();
            incoming.extend(
                state
                    .group_shares
                    .values()
                    .filter(|s| {
                        !s.revoked
                            && s.wraps.contains_key(recipient)
                            && state
                                .groups
                                .get(&s.group_id)
                                .is_some_and(|g| g.is_member(recipient))
                    })
                    .map(|s| IncomingShare {
                        share_id: s.id,
                        share_code: s.share_code.clone(),
                        file_id: s.file_id,
                        file_name: file_name_of(state, s.file_id),
                        content_type: content_type_of(state, s.file_id),
                        sender: s.sender.clone(),
                        group_id: Some(s.group_id),
                        permission: s.permission,
                        created_at: s.created_at,
                        viewed: s.wraps[recipient].viewed,
                    }),
            );
            incoming.sort_by_key(|s| s.share_id);
            incoming
        })
    }

    /// Shares fanned out to one group, newest last
    pub fn list_outgoing_for_group(&self, group_id: u64) -> Vec<OutgoingShare> {
        self.db.read(|state| {
            let mut out: Vec<OutgoingShare> = state
                .group_shares
                .values()
                .filter(|s| s.group_id == group_id)
                .map(|s| OutgoingShare {
                    share_id: s.id,
                    share_code: s.share_code.clone(),
                    file_id: s.file_id,
                    file_name: file_name_of(state, s.file_id),
                    recipient: None,
                    group_id: Some(s.group_id),
                    permission: s.permission,
                    created_at: s.created_at,
                    viewed: s.wraps.values().any(|w| w.viewed),
                    revoked: s.revoked,
                })
                .collect();
            out.sort_by_key(|s| s.share_id);
            out
        })
    }

    /// Revoke a share; terminal, owner-only
    pub fn revoke(&self, share_id: u64, caller: &str) -> Result<()> {
        self.db.mutate(|state| {
            if let Some(share) = state.direct_shares.get_mut(&share_id) {
                if share.sender != caller {
                    return Err(ApiError::new(
                        ErrorKind::Forbidden,
                        "only the share creator may revoke it",
                    ));
                }
                share.revoked = true;
                tracing::info!(share_id, "direct share revoked");
                return Ok(());
            }
            if let Some(share) = state.group_shares.get_mut(&share_id) {
                if share.sender != caller {
                    return Err(ApiError::new(
                        ErrorKind::Forbidden,
                        "only the share creator may revoke it",
                    ));
                }
                share.revoked = true;
                tracing::info!(share_id, "group share revoked");
                return Ok(());
            }
            Err(not_found("share"))
        })
    }

    /// May `caller` read the blob of `file_id`?
    ///
    /// True for the owner, an active direct share addressed to the
    /// caller, or current membership in a group holding an active share
    /// for this file. Membership is evaluated at read time: leaving a
    /// group ends future reads.
    pub fn authorize_read(&self, file_id: u64, caller: &str) -> bool {
        self.db.read(|state| {
            if state.files.get(&file_id).is_some_and(|f| f.owner == caller) {
                return true;
            }
            let direct = state
                .direct_shares
                .values()
                .any(|s| s.file_id == file_id && s.recipient == caller && !s.revoked);
            if direct {
                return true;
            }
            state.group_shares.values().any(|s| {
                s.file_id == file_id
                    && !s.revoked
                    && state
                        .groups
                        .get(&s.group_id)
                        .is_some_and(|g| g.is_member(caller))
            })
        })
    }
}

fn file_name_of(state: &crate::store::DbState, file_id: u64) -> String {
    state
        .files
        .get(&file_id)
        .map(|f| f.file_name.clone())
        .unwrap_or_default()
}

fn content_type_of(state: &crate::store::DbState, file_id: u64) -> String {
    state
        .files
        .get(&file_id)
        .map(|f| f.content_type.clone())
        .unwrap_or_default()
}

/// Draw a share-code unused by any live record, retrying on collision
fn fresh_share_code(state: &crate::store::DbState) -> Result<String> {
    loop {
        let mut bytes = [0u8; SHARE_CODE_LEN / 2];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| ApiError::Internal(format!("share-code generation failed: {}", e)))?;
        let code = hex::encode(bytes);
        if !state.code_in_use(&code) {
            return Ok(code);
        }
    }
}
