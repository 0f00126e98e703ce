//! Opaque ciphertext blob storage
//!
//! Blobs are addressed by server-assigned file-id and never inspected,
//! re-encrypted, or re-compressed. The filesystem backend commits via
//! temp-write, fsync, atomic rename so a blob is either fully present
//! or absent.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `BlobError`
pub type Result<T> = std::result::Result<T, BlobError>;

/// Errors from the blob store
#[derive(Error, Debug)]
pub enum BlobError {
    /// No blob stored under this file-id
    #[error("blob {0} not found")]
    NotFound(u64),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for blob storage backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob under a file-id; atomic and durable on return
    async fn put(&self, file_id: u64, blob: Bytes) -> Result<()>;

    /// Retrieve a blob by file-id
    async fn get(&self, file_id: u64) -> Result<Bytes>;

    /// Delete a blob; idempotent on a missing id
    async fn delete(&self, file_id: u64) -> Result<()>;

    /// Check whether a blob exists
    async fn has(&self, file_id: u64) -> Result<bool>;
}

/// Filesystem-backed blob store, one file per record named by file-id
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    /// Create the store, making the directory if needed
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn blob_path(&self, file_id: u64) -> PathBuf {
        self.dir.join(file_id.to_string())
    }

    fn tmp_path(&self, file_id: u64) -> PathBuf {
        self.dir.join(format!(".tmp-{}", file_id))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, file_id: u64, blob: Bytes) -> Result<()> {
        let tmp = self.tmp_path(file_id);
        let dest = self.blob_path(file_id);

        let mut file = tokio::fs::File::create(&tmp).await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &blob).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &dest).await?;
        Ok(())
    }

    async fn get(&self, file_id: u64) -> Result<Bytes> {
        match tokio::fs::read(self.blob_path(file_id)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound(file_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, file_id: u64) -> Result<()> {
        match tokio::fs::remove_file(self.blob_path(file_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn has(&self, file_id: u64) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.blob_path(file_id)).await?)
    }
}

/// In-memory blob store for testing
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<u64, Bytes>,
}

impl MemoryBlobStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs stored
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Snapshot every stored blob (test assertions)
    pub fn all_blobs(&self) -> Vec<Bytes> {
        self.blobs.iter().map(|e| e.value().clone()).collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, file_id: u64, blob: Bytes) -> Result<()> {
        self.blobs.insert(file_id, blob);
        Ok(())
    }

    async fn get(&self, file_id: u64) -> Result<Bytes> {
        self.blobs
            .get(&file_id)
            .map(|e| e.value().clone())
            .ok_or(BlobError::NotFound(file_id))
    }

    async fn delete(&self, file_id: u64) -> Result<()> {
        self.blobs.remove(&file_id);
        Ok(())
    }

    async fn has(&self, file_id: u64) -> Result<bool> {
        Ok(self.blobs.contains_key(&file_id))
    }
}

/// Dispatch between the persistent and memory backends
pub enum FlexibleBlobStore {
    Fs(FsBlobStore),
    Memory(MemoryBlobStore),
}

impl FlexibleBlobStore {
    /// Whether blobs survive a restart
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Fs(_))
    }
}

#[async_trait]
impl BlobStore for FlexibleBlobStore {
    async fn put(&self, file_id: u64, blob: Bytes) -> Result<()> {
        match self {
            Self::Fs(s) => s.put(file_id, blob).await,
            Self::Memory(s) => s.put(file_id, blob).await,
        }
    }

    async fn get(&self, file_id: u64) -> Result<Bytes> {
        match self {
            Self::Fs(s) => s.get(file_id).await,
            Self::Memory(s) => s.get(file_id).await,
        }
    }

    async fn delete(&self, file_id: u64) -> Result<()> {
        match self {
            Self::Fs(s) => s.delete(file_id).await,
            Self::Memory(s) => s.delete(file_id).await,
        }
    }

    async fn has(&self, file_id: u64) -> Result<bool> {
        match self {
            Self::Fs(s) => s.has(file_id).await,
            Self::Memory(s) => s.has(file_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let store = MemoryBlobStore::new();
        store.put(1, Bytes::from_static(b"blob bytes")).await.unwrap();

        assert!(store.has(1).await.unwrap());
        assert_eq!(store.get(1).await.unwrap(), Bytes::from_static(b"blob bytes"));

        store.delete(1).await.unwrap();
        assert!(!store.has(1).await.unwrap());
        assert!(matches!(store.get(1).await, Err(BlobError::NotFound(1))));
    }

    #[tokio::test]
    async fn test_fs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf()).unwrap();

        store.put(42, Bytes::from_static(b"on disk")).await.unwrap();
        assert_eq!(store.get(42).await.unwrap(), Bytes::from_static(b"on disk"));

        // No temp file left behind after commit
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["42".to_string()]);
    }

    #[tokio::test]
    async fn test_fs_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf()).unwrap();

        store.delete(9).await.unwrap();
        store.put(9, Bytes::from_static(b"x")).await.unwrap();
        store.delete(9).await.unwrap();
        store.delete(9).await.unwrap();
        assert!(!store.has(9).await.unwrap());
    }

    #[tokio::test]
    async fn test_fs_overwrite_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf()).unwrap();

        store.put(3, Bytes::from_static(b"first")).await.unwrap();
        store.put(3, Bytes::from_static(b"second")).await.unwrap();
        assert_eq!(store.get(3).await.unwrap(), Bytes::from_static(b"second"));
    }
}
