//! Group and group-share handlers

use crate::error::Result;
use crate::groups::{GroupInfo, MemberKey};
use crate::handlers::shares::decode_payload;
use crate::ledger::OutgoingShare;
use crate::state::{AppState, SessionContext};
use crate::store::{GroupRole, Permission};
use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
}

/// POST /api/groups
pub async fn create_group(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<Response> {
    let group = state.groups.create(&session.researcher_id, &req.name)?;
    Ok((StatusCode::CREATED, Json(group)).into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupListResponse {
    pub groups: Vec<GroupInfo>,
}

/// GET /api/groups
pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<GroupListResponse>> {
    Ok(Json(GroupListResponse {
        groups: state.groups.list_for(&session.researcher_id),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub researcher_id: String,
    #[serde(default = "default_role")]
    pub role: GroupRole,
}

fn default_role() -> GroupRole {
    GroupRole::Member
}

/// POST /api/groups/{id}/members
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(group_id): Path<u64>,
    Json(req): Json<AddMemberRequest>,
) -> Result<Json<GroupInfo>> {
    let group = state.groups.add_member(
        group_id,
        &session.researcher_id,
        &req.researcher_id,
        req.role,
    )?;
    Ok(Json(group))
}

/// DELETE /api/groups/{id}/members/{researcherId}
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path((group_id, researcher_id)): Path<(u64, String)>,
) -> Result<Json<GroupInfo>> {
    let group = state
        .groups
        .remove_member(group_id, &session.researcher_id, &researcher_id)?;
    Ok(Json(group))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberKeysResponse {
    pub members: Vec<MemberKey>,
}

/// GET /api/groups/{id}/keys - members with their registered keys
pub async fn list_member_keys(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(group_id): Path<u64>,
) -> Result<Json<MemberKeysResponse>> {
    Ok(Json(MemberKeysResponse {
        members: state.groups.member_keys(group_id, &session.researcher_id)?,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupShareRequest {
    pub file_id: u64,
    /// member-id → recipient-wrap KEM payload (base64)
    pub payloads: HashMap<String, String>,
    #[serde(default)]
    pub permission: Permission,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupShareResponse {
    pub share_id: u64,
    pub share_code: String,
}

/// POST /api/groups/{id}/shares - atomic fan-out
pub async fn create_group_share(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(group_id): Path<u64>,
    Json(req): Json<CreateGroupShareRequest>,
) -> Result<Response> {
    let mut payloads = HashMap::with_capacity(req.payloads.len());
    for (member, b64) in &req.payloads {
        payloads.insert(member.clone(), decode_payload(b64)?);
    }

    let (share_id, share_code) = state.ledger.share_group(
        &session.researcher_id,
        req.file_id,
        group_id,
        &payloads,
        req.permission,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(CreateGroupShareResponse { share_id, share_code }),
    )
        .into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSharesResponse {
    pub shares: Vec<OutgoingShare>,
}

/// GET /api/groups/{id}/shares
pub async fn list_group_shares(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(group_id): Path<u64>,
) -> Result<Json<GroupSharesResponse>> {
    // Visibility follows membership
    state.groups.get(group_id, &session.researcher_id)?;
    let shares = state
        .ledger
        .list_outgoing_for_group(group_id);
    Ok(Json(GroupSharesResponse { shares }))
}
