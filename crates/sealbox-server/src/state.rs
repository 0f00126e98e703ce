//! Application state

use crate::blobstore::{FlexibleBlobStore, FsBlobStore, MemoryBlobStore};
use crate::config::ServerConfig;
use crate::files::FileIndex;
use crate::groups::GroupService;
use crate::ledger::ShareLedger;
use crate::registry::Registry;
use crate::store::Db;
use std::sync::Arc;
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Durable ledger store
    pub db: Arc<Db>,
    /// Ciphertext blob store
    pub blobs: Arc<FlexibleBlobStore>,
    /// Identity & key registry
    pub registry: Registry,
    /// File records and blob coordination
    pub files: FileIndex,
    /// Share ledger
    pub ledger: ShareLedger,
    /// Group management
    pub groups: GroupService,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let (db, blobs) = if config.use_memory_store {
            warn!("⚠ Storage mode: in-memory (NOT persistent - for development only)");
            (
                Arc::new(Db::in_memory()),
                Arc::new(FlexibleBlobStore::Memory(MemoryBlobStore::new())),
            )
        } else {
            std::fs::create_dir_all(&config.data_dir)?;
            let db = Arc::new(Db::open(config.ledger_path())?);
            let blobs = Arc::new(FlexibleBlobStore::Fs(FsBlobStore::new(config.blob_dir())?));
            info!("✓ Storage mode: filesystem at {}", config.data_dir.display());
            (db, blobs)
        };

        let registry = Registry::new(db.clone(), &config)
            .map_err(|e| anyhow::anyhow!("registry init failed: {}", e))?;
        let files = FileIndex::new(db.clone(), blobs.clone(), config.max_plaintext_size);
        let ledger = ShareLedger::new(db.clone());
        let groups = GroupService::new(db.clone());

        Ok(Self {
            config,
            db,
            blobs,
            registry,
            files,
            ledger,
            groups,
        })
    }
}

/// The authenticated caller, resolved by the auth middleware
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// The bearer token this request presented
    pub token: String,
    /// The identity the token names
    pub researcher_id: String,
}
