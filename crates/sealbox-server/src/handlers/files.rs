//! File upload, download, and metadata handlers

use crate::error::{ApiError, ErrorKind, Result};
use crate::files::NewFileParams;
use crate::state::{AppState, SessionContext};
use crate::store::FileRecord;
use axum::{
    Json,
    extract::{Extension, Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

/// File metadata on the wire
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetaResponse {
    pub file_id: u64,
    pub file_name: String,
    pub original_size: u64,
    pub ciphertext_size: u64,
    pub content_type: String,
    pub sha256_hash: String,
    /// The owner-wrap KEM payload, base64; present for the owner only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_wrap: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

fn meta_response(record: FileRecord, include_wrap: bool) -> FileMetaResponse {
    FileMetaResponse {
        file_id: record.id,
        file_name: record.file_name,
        original_size: record.original_size,
        ciphertext_size: record.ciphertext_size,
        content_type: record.content_type,
        sha256_hash: record.sha256_hash,
        owner_wrap: include_wrap.then_some(record.owner_wrap),
        created_at: record.created_at,
    }
}

/// POST /api/files - multipart upload
///
/// Fields: `file` (ct ∥ tag), `fileName`, `originalSize`, `iv` (base64),
/// `sha256Hash` (lowercase hex), `contentType`, `ownerKemCt` (base64).
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut ciphertext: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut original_size: Option<u64> = None;
    let mut iv: Option<Vec<u8>> = None;
    let mut sha256_hash: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut owner_wrap: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(ErrorKind::InvalidInput, format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                ciphertext = Some(field.bytes().await.map_err(|e| {
                    ApiError::new(ErrorKind::InvalidInput, format!("failed to read file field: {}", e))
                })?);
            }
            "fileName" => file_name = Some(text_field(field).await?),
            "originalSize" => {
                let text = text_field(field).await?;
                original_size = Some(text.parse().map_err(|_| {
                    ApiError::new(ErrorKind::InvalidInput, "originalSize must be an integer")
                })?);
            }
            "iv" => iv = Some(base64_field(field).await?),
            "sha256Hash" => sha256_hash = Some(text_field(field).await?),
            "contentType" => content_type = Some(text_field(field).await?),
            "ownerKemCt" => owner_wrap = Some(base64_field(field).await?),
            _ => {}
        }
    }

    let params = NewFileParams {
        file_name: require(file_name, "fileName")?,
        original_size: require(original_size, "originalSize")?,
        content_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
        iv: require(iv, "iv")?,
        sha256_hash: require(sha256_hash, "sha256Hash")?,
        owner_wrap: require(owner_wrap, "ownerKemCt")?,
    };
    let ciphertext = require(ciphertext, "file")?;

    let record = state
        .files
        .create(&session.researcher_id, params, ciphertext)
        .await?;

    Ok((StatusCode::CREATED, Json(meta_response(record, true))).into_response())
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::new(ErrorKind::InvalidInput, format!("malformed field: {}", e)))
}

async fn base64_field(field: axum::extract::multipart::Field<'_>) -> Result<Vec<u8>> {
    use base64::Engine;
    let text = text_field(field).await?;
    base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|_| ApiError::new(ErrorKind::InvalidInput, "field is not valid base64"))
}

fn require<T>(value: Option<T>, name: &str) -> Result<T> {
    value.ok_or_else(|| ApiError::new(ErrorKind::InvalidInput, format!("missing field {}", name)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    pub files: Vec<FileMetaResponse>,
}

/// GET /api/files - the caller's own files
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<FileListResponse>> {
    let files = state
        .files
        .list_for(&session.researcher_id)
        .into_iter()
        .map(|r| meta_response(r, true))
        .collect();
    Ok(Json(FileListResponse { files }))
}

/// GET /api/files/{id} - metadata, for anyone authorized to read
pub async fn file_metadata(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(file_id): Path<u64>,
) -> Result<Json<FileMetaResponse>> {
    let record = state.files.get(file_id)?;
    if !state.ledger.authorize_read(file_id, &session.researcher_id) {
        return Err(ApiError::new(
            ErrorKind::Forbidden,
            "you are not authorized to read this file",
        ));
    }
    let is_owner = record.owner == session.researcher_id;
    Ok(Json(meta_response(record, is_owner)))
}

/// GET /api/files/{id}/blob - the stored `IV ∥ ct ∥ tag` bytes
///
/// Authorization is delegated to the share ledger.
pub async fn download_blob(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(file_id): Path<u64>,
) -> Result<Response> {
    // 404 before 403: a file that does not exist is not revealed
    let record = state.files.get(file_id)?;
    if !state.ledger.authorize_read(file_id, &session.researcher_id) {
        return Err(ApiError::new(
            ErrorKind::Forbidden,
            "you are not authorized to read this file",
        ));
    }

    let blob = state.files.read_blob(file_id).await?;
    tracing::debug!(file_id, caller = %session.researcher_id, bytes = blob.len(), "blob served");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", record.file_name.replace('"', "")),
            ),
        ],
        blob,
    )
        .into_response())
}

/// DELETE /api/files/{id} - owner-only, cascades shares, idempotent
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(file_id): Path<u64>,
) -> Result<StatusCode> {
    state.files.delete(file_id, &session.researcher_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
