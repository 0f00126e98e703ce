//! Group management
//!
//! Groups are named member sets with owner/admin/member roles. Fan-out
//! mappings are built from the member key listing this module serves;
//! membership changes never rewrite existing share records.

use crate::error::{ApiError, ErrorKind, Result};
use crate::store::{Db, GroupRecord, GroupRole, not_found};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A group as returned to members
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub group_id: u64,
    pub name: String,
    pub created_by: String,
    pub members: Vec<GroupMember>,
    pub created_at: DateTime<Utc>,
}

/// One member row
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub researcher_id: String,
    pub role: GroupRole,
}

/// A member with their registered public key, for building fan-outs
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberKey {
    pub researcher_id: String,
    pub role: GroupRole,
    /// Kyber-512 public key, base64; None when unregistered
    pub public_key: Option<String>,
}

fn info_of(record: &GroupRecord) -> GroupInfo {
    let mut members: Vec<GroupMember> = record
        .members
        .iter()
        .map(|(id, role)| GroupMember {
            researcher_id: id.clone(),
            role: *role,
        })
        .collect();
    members.sort_by(|a, b| a.researcher_id.cmp(&b.researcher_id));
    GroupInfo {
        group_id: record.id,
        name: record.name.clone(),
        created_by: record.created_by.clone(),
        members,
        created_at: record.created_at,
    }
}

/// The group service
#[derive(Clone)]
pub struct GroupService {
    db: Arc<Db>,
}

impl GroupService {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Create a group; the creator becomes its owner
    pub fn create(&self, creator: &str, name: &str) -> Result<GroupInfo> {
        if name.is_empty() || name.chars().count() > 64 {
            return Err(ApiError::new(
                ErrorKind::InvalidInput,
                "group name must be 1-64 characters",
            ));
        }
        self.db.mutate(|state| {
            let taken = state
                .groups
                .values()
                .any(|g| g.created_by == creator && g.name == name);
            if taken {
                return Err(ApiError::new(
                    ErrorKind::AlreadyExists,
                    "you already have a group with this name",
                ));
            }
            let id = state.next_group_id;
            state.next_group_id += 1;
            let mut members = HashMap::new();
            members.insert(creator.to_string(), GroupRole::Owner);
            let record = GroupRecord {
                id,
                name: name.to_string(),
                created_by: creator.to_string(),
                members,
                created_at: Utc::now(),
            };
            let info = info_of(&record);
            state.groups.insert(id, record);
            tracing::info!(group_id = id, name = %name, "group created");
            Ok(info)
        })
    }

    /// Groups the caller belongs to
    pub fn list_for(&self, researcher_id: &str) -> Vec<GroupInfo> {
        self.db.read(|state| {
            state
                .groups
                .values()
                .filter(|g| g.is_member(researcher_id))
                .map(info_of)
                .collect()
        })
    }

    /// Fetch a group the caller belongs to
    pub fn get(&self, group_id: u64, caller: &str) -> Result<GroupInfo> {
        self.db.read(|state| {
            let group = state.groups.get(&group_id).ok_or_else(|| not_found("group"))?;
            if !group.is_member(caller) {
                return Err(not_found("group"));
            }
            Ok(info_of(group))
        })
    }

    /// Add a member; requires admin or owner
    ///
    /// Joining grants nothing retroactively: existing group shares
    /// carry no payload for the new member.
    pub fn add_member(
        &self,
        group_id: u64,
        caller: &str,
        member_id: &str,
        role: GroupRole,
    ) -> Result<GroupInfo> {
        if role == GroupRole::Owner {
            return Err(ApiError::new(
                ErrorKind::InvalidInput,
                "a group has exactly one owner",
            ));
        }
        self.db.mutate(|state| {
            if !state.identities.contains_key(member_id) {
                return Err(not_found("identity"));
            }
            let group = state.groups.get_mut(&group_id).ok_or_else(|| not_found("group"))?;
            if !group.role_of(caller).is_some_and(|r| r.can_manage()) {
                return Err(ApiError::new(
                    ErrorKind::Forbidden,
                    "membership changes require an admin or owner role",
                ));
            }
            if group.is_member(member_id) {
                return Err(ApiError::new(
                    ErrorKind::AlreadyExists,
                    "already a member of this group",
                ));
            }
            group.members.insert(member_id.to_string(), role);
            tracing::info!(group_id, member = %member_id, "member added");
            Ok(info_of(group))
        })
    }

    /// Remove a member; requires admin or owner
    ///
    /// Ends the member's future reads of group-shared files; payloads
    /// they already fetched are beyond recall.
    pub fn remove_member(&self, group_id: u64, caller: &str, member_id: &str) -> Result<GroupInfo> {
        self.db.mutate(|state| {
            let group = state.groups.get_mut(&group_id).ok_or_else(|| not_found("group"))?;
            if !group.role_of(caller).is_some_and(|r| r.can_manage()) {
                return Err(ApiError::new(
                    ErrorKind::Forbidden,
                    "membership changes require an admin or owner role",
                ));
            }
            match group.role_of(member_id) {
                None => return Err(not_found("member")),
                Some(GroupRole::Owner) => {
                    return Err(ApiError::new(
                        ErrorKind::InvalidInput,
                        "the group owner cannot be removed",
                    ));
                }
                Some(_) => {}
            }
            group.members.remove(member_id);
            tracing::info!(group_id, member = %member_id, "member removed");
            Ok(info_of(group))
        })
    }

    /// Current members with their registered public keys
    ///
    /// The sender uses this to build a fan-out mapping; members without
    /// a key are surfaced so the share can fail before any wrap.
    pub fn member_keys(&self, group_id: u64, caller: &str) -> Result<Vec<MemberKey>> {
        self.db.read(|state| {
            let group = state.groups.get(&group_id).ok_or_else(|| not_found("group"))?;
            if !group.is_member(caller) {
                return Err(not_found("group"));
            }
            let mut keys: Vec<MemberKey> = group
                .members
                .iter()
                .map(|(id, role)| MemberKey {
                    researcher_id: id.clone(),
                    role: *role,
                    public_key: state.identities.get(id).and_then(|i| i.public_key.clone()),
                })
                .collect();
            keys.sort_by(|a, b| a.researcher_id.cmp(&b.researcher_id));
            Ok(keys)
        })
    }
}
