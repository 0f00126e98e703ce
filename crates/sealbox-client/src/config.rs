//! Client configuration

use std::path::PathBuf;
use std::time::Duration;

/// Sealbox client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server base URL, e.g. `http://localhost:8420`
    pub base_url: String,
    /// Directory holding the local Kyber keystore
    pub keystore_dir: PathBuf,
    /// Request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    /// Configuration for the given server with the default keystore dir
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            keystore_dir: default_keystore_dir(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Override the keystore directory
    pub fn with_keystore_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.keystore_dir = dir.into();
        self
    }
}

/// `$HOME/.sealbox/keys`, falling back to a relative directory
fn default_keystore_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(".sealbox").join("keys"))
        .unwrap_or_else(|| PathBuf::from(".sealbox-keys"))
}
