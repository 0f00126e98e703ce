//! Identity & key registry handlers

use crate::error::{ApiError, ErrorKind, Result};
use crate::state::{AppState, SessionContext};
use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn decode_public_key(b64: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|_| ApiError::new(ErrorKind::BadKey, "public key is not valid base64"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub researcher_id: String,
    pub password: String,
    /// Kyber-512 public key, base64 (optional at registration)
    pub public_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub researcher_id: String,
    pub has_public_key: bool,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response> {
    let key_bytes = req.public_key.as_deref().map(decode_public_key).transpose()?;
    let (token, snapshot) =
        state
            .registry
            .register(&req.researcher_id, &req.password, key_bytes.as_deref())?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            researcher_id: snapshot.researcher_id,
            has_public_key: snapshot.has_public_key,
        }),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub researcher_id: String,
    pub password: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let (token, snapshot) = state.registry.login(&req.researcher_id, &req.password)?;
    Ok(Json(AuthResponse {
        token,
        researcher_id: snapshot.researcher_id,
        has_public_key: snapshot.has_public_key,
    }))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<StatusCode> {
    state.registry.logout(&session.token)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub researcher_id: String,
    pub has_public_key: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// GET /api/auth/session
pub async fn session(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<SessionResponse>> {
    let snapshot = state.registry.session(&session.token)?;
    Ok(Json(SessionResponse {
        researcher_id: snapshot.researcher_id,
        has_public_key: snapshot.has_public_key,
        created_at: snapshot.created_at,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPublicKeyRequest {
    /// Kyber-512 public key, base64
    pub public_key: String,
}

/// PUT /api/keys
pub async fn set_public_key(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<SetPublicKeyRequest>,
) -> Result<StatusCode> {
    let key_bytes = decode_public_key(&req.public_key)?;
    state.registry.set_public_key(&session.researcher_id, &key_bytes)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub researcher_id: String,
    /// Kyber-512 public key, base64
    pub public_key: String,
}

/// GET /api/keys/{researcherId} - public, session-free
pub async fn lookup_public_key(
    State(state): State<Arc<AppState>>,
    Path(researcher_id): Path<String>,
) -> Result<Json<PublicKeyResponse>> {
    let public_key = state.registry.lookup_public_key(&researcher_id)?;
    Ok(Json(PublicKeyResponse {
        researcher_id,
        public_key,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub prefix: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub identities: Vec<crate::registry::IdentityMatch>,
}

/// GET /api/identities?prefix=
pub async fn search_identities(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<SessionContext>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    Ok(Json(SearchResponse {
        identities: state.registry.search(&params.prefix),
    }))
}
