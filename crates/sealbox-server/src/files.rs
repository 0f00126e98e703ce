//! File records and upload/download coordination
//!
//! Validates upload integrity before any write, commits the blob before
//! the file record (so no record ever points at a missing or short
//! blob), and cascades share removal on delete.

use crate::blobstore::{BlobStore, FlexibleBlobStore};
use crate::error::{ApiError, ErrorKind, Result};
use crate::store::{Db, FileRecord, not_found};
use bytes::Bytes;
use chrono::Utc;
use sealbox_crypto::{BLOB_OVERHEAD, Fingerprint, IV_SIZE, KemPayload};
use std::sync::Arc;

/// Upload metadata accompanying the ciphertext
pub struct NewFileParams {
    pub file_name: String,
    pub original_size: u64,
    pub content_type: String,
    /// The 12-byte IV, transported separately from the ciphertext
    pub iv: Vec<u8>,
    /// Lowercase hex SHA-256 over `ciphertext ∥ tag`
    pub sha256_hash: String,
    /// The owner-wrap KEM payload (800 bytes)
    pub owner_wrap: Vec<u8>,
}

/// File record service over the ledger and the blob store
#[derive(Clone)]
pub struct FileIndex {
    db: Arc<Db>,
    blobs: Arc<FlexibleBlobStore>,
    max_plaintext_size: u64,
}

impl FileIndex {
    pub fn new(db: Arc<Db>, blobs: Arc<FlexibleBlobStore>, max_plaintext_size: u64) -> Self {
        Self {
            db,
            blobs,
            max_plaintext_size,
        }
    }

    /// Accept an upload: validate, store the blob, then commit the record
    ///
    /// `ciphertext` is `ct ∥ tag` without the IV; the stored blob is
    /// `IV ∥ ct ∥ tag`.
    pub async fn create(
        &self,
        owner: &str,
        params: NewFileParams,
        ciphertext: Bytes,
    ) -> Result<FileRecord> {
        if params.file_name.is_empty() {
            return Err(ApiError::new(ErrorKind::InvalidInput, "file name required"));
        }
        if params.original_size > self.max_plaintext_size {
            return Err(ApiError::new(
                ErrorKind::InvalidInput,
                format!("file exceeds the {} byte limit", self.max_plaintext_size),
            ));
        }
        if params.iv.len() != IV_SIZE {
            return Err(ApiError::new(
                ErrorKind::InvalidInput,
                format!("IV must be {} bytes", IV_SIZE),
            ));
        }
        // Wrong-length owner wraps are rejected before anything is stored
        KemPayload::from_bytes(&params.owner_wrap)?;

        let blob_len = (params.iv.len() + ciphertext.len()) as u64;
        if blob_len != params.original_size + BLOB_OVERHEAD as u64 {
            return Err(ApiError::new(
                ErrorKind::SizeMismatch,
                format!(
                    "blob is {} bytes, expected {} ({} + {} overhead)",
                    blob_len,
                    params.original_size + BLOB_OVERHEAD as u64,
                    params.original_size,
                    BLOB_OVERHEAD
                ),
            ));
        }

        let declared = Fingerprint::from_hex(&params.sha256_hash)
            .map_err(|_| ApiError::new(ErrorKind::InvalidInput, "malformed sha256 fingerprint"))?;
        if !declared.matches(&ciphertext) {
            return Err(ApiError::new(
                ErrorKind::FingerprintMismatch,
                "ciphertext does not hash to the declared fingerprint",
            ));
        }

        // Reserve an id, make the blob durable, then commit the record
        let file_id = self.db.mutate(|state| {
            let id = state.next_file_id;
            state.next_file_id += 1;
            Ok(id)
        })?;

        let mut blob = Vec::with_capacity(blob_len as usize);
        blob.extend_from_slice(&params.iv);
        blob.extend_from_slice(&ciphertext);
        self.blobs.put(file_id, Bytes::from(blob)).await?;

        let record = FileRecord {
            id: file_id,
            owner: owner.to_string(),
            file_name: params.file_name,
            original_size: params.original_size,
            ciphertext_size: blob_len,
            content_type: params.content_type,
            sha256_hash: declared.to_hex(),
            owner_wrap: {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD.encode(&params.owner_wrap)
            },
            created_at: Utc::now(),
        };

        let commit = self.db.mutate(|state| {
            state.files.insert(file_id, record.clone());
            Ok(record.clone())
        });

        match commit {
            Ok(record) => {
                tracing::info!(file_id, owner = %owner, size = params.original_size, "file stored");
                Ok(record)
            }
            Err(e) => {
                // Roll the orphan blob back; the record never existed
                let _ = self.blobs.delete(file_id).await;
                Err(e)
            }
        }
    }

    /// Fetch a file record
    pub fn get(&self, file_id: u64) -> Result<FileRecord> {
        self.db
            .read(|s| s.files.get(&file_id).cloned())
            .ok_or_else(|| not_found("file"))
    }

    /// Files owned by the caller, oldest first
    pub fn list_for(&self, owner: &str) -> Vec<FileRecord> {
        self.db.read(|s| {
            s.files
                .values()
                .filter(|f| f.owner == owner)
                .cloned()
                .collect()
        })
    }

    /// Read a stored blob
    pub async fn read_blob(&self, file_id: u64) -> Result<Bytes> {
        Ok(self.blobs.get(file_id).await?)
    }

    /// Owner-only delete; cascades every share referencing the file.
    /// Idempotent on a missing file.
    pub async fn delete(&self, file_id: u64, caller: &str) -> Result<()> {
        let existed = self.db.mutate(|state| {
            let Some(record) = state.files.get(&file_id) else {
                return Ok(false);
            };
            if record.owner != caller {
                return Err(ApiError::new(
                    ErrorKind::Forbidden,
                    "only the owner may delete a file",
                ));
            }
            state.files.remove(&file_id);
            state.direct_shares.retain(|_, s| s.file_id != file_id);
            state.group_shares.retain(|_, s| s.file_id != file_id);
            Ok(true)
        })?;

        if existed {
            self.blobs.delete(file_id).await?;
            tracing::info!(file_id, "file deleted");
        }
        Ok(())
    }
}
