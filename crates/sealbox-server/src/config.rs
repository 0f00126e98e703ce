//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sealbox server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory for the ledger snapshot and blob files
    pub data_dir: PathBuf,
    /// Keep everything in memory (for testing, data will not persist)
    pub use_memory_store: bool,
    /// Rate limit (requests per second per identity)
    pub rate_limit_rps: u32,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Maximum accepted plaintext size (bytes); bounds upload blobs
    pub max_plaintext_size: u64,
    /// Session lifetime in days
    pub session_ttl_days: i64,
    /// Maximum results returned by identity prefix search
    pub search_limit: usize,
    /// Minimum password length accepted at registration
    pub min_password_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let max_plaintext_size = 100 * 1024 * 1024; // 100 MiB
        Self {
            host: "0.0.0.0".to_string(),
            port: 8420,
            data_dir: PathBuf::from("./sealbox-data"),
            use_memory_store: false,
            rate_limit_rps: 100,
            // blob + IV/tag overhead + multipart envelope
            max_body_size: max_plaintext_size as usize + 64 * 1024,
            max_plaintext_size,
            session_ttl_days: 30,
            search_limit: 20,
            min_password_len: 6,
        }
    }
}

impl ServerConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Path of the durable ledger snapshot
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.json")
    }

    /// Directory holding ciphertext blobs
    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}
