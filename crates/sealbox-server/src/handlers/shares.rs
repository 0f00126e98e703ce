//! Direct share handlers

use crate::error::{ApiError, ErrorKind, Result};
use crate::ledger::{FetchedShare, IncomingShare, OutgoingShare};
use crate::state::{AppState, SessionContext};
use crate::store::Permission;
use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub(crate) fn decode_payload(b64: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|_| ApiError::new(ErrorKind::BadPayload, "payload is not valid base64"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareRequest {
    pub file_id: u64,
    pub recipient_id: String,
    /// The recipient-wrap KEM payload, base64 (800 bytes decoded)
    pub payload: String,
    #[serde(default)]
    pub permission: Permission,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareResponse {
    pub share_id: u64,
    pub share_code: String,
}

/// POST /api/shares
pub async fn create_share(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<CreateShareRequest>,
) -> Result<Response> {
    let payload = decode_payload(&req.payload)?;
    let (share_id, share_code) = state.ledger.share_direct(
        &session.researcher_id,
        req.file_id,
        &req.recipient_id,
        &payload,
        req.permission,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(CreateShareResponse { share_id, share_code }),
    )
        .into_response())
}

/// GET /api/shares/code/{code}
pub async fn fetch_by_code(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(code): Path<String>,
) -> Result<Json<FetchedShare>> {
    let fetched = state.ledger.fetch_by_code(&session.researcher_id, &code)?;
    Ok(Json(fetched))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingResponse {
    pub shares: Vec<OutgoingShare>,
}

/// GET /api/shares/outgoing
pub async fn list_outgoing(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<OutgoingResponse>> {
    Ok(Json(OutgoingResponse {
        shares: state.ledger.list_outgoing(&session.researcher_id),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingResponse {
    pub shares: Vec<IncomingShare>,
}

/// GET /api/shares/incoming
pub async fn list_incoming(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<IncomingResponse>> {
    Ok(Json(IncomingResponse {
        shares: state.ledger.list_incoming(&session.researcher_id),
    }))
}

/// DELETE /api/shares/{id} - revoke
pub async fn revoke_share(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(share_id): Path<u64>,
) -> Result<StatusCode> {
    state.ledger.revoke(share_id, &session.researcher_id)?;
    Ok(StatusCode::NO_CONTENT)
}
