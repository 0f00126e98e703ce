//! Local Kyber keystore
//!
//! A durable, process-local directory of Kyber-512 keypairs keyed by
//! identifier. Private keys never cross the process boundary: nothing
//! here is network-addressable and logout does not wipe the store. A
//! lost keystore means permanent loss of decrypt capability for every
//! share addressed to that identity's key.

use crate::error::{ClientError, Result};
use parking_lot::Mutex;
use sealbox_crypto::{KyberKeyPair, KyberPublicKey, KyberSecretKey, generate_keypair};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Serialized keypair entry, one file per identity
#[derive(Serialize, Deserialize)]
struct StoredKeyPair {
    /// Kyber-512 public key, base64
    public_key: String,
    /// Kyber-512 secret key, base64
    secret_key: String,
}

/// Directory-backed keystore
pub struct Keystore {
    dir: PathBuf,
    /// Serializes generation per process so two keypairs never race
    /// into storage for the same identity
    gen_lock: Mutex<()>,
}

impl Keystore {
    /// Open (creating if needed) a keystore directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
        }
        Ok(Self {
            dir,
            gen_lock: Mutex::new(()),
        })
    }

    // Identifiers may contain any printable character; hex-encode for a
    // filesystem-safe name
    fn path_for(&self, researcher_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(researcher_id)))
    }

    /// Whether a keypair exists for this identity
    pub fn has(&self, researcher_id: &str) -> bool {
        self.path_for(researcher_id).exists()
    }

    /// Load the keypair for an identity, if present
    pub fn get(&self, researcher_id: &str) -> Result<Option<KyberKeyPair>> {
        let path = self.path_for(researcher_id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredKeyPair = serde_json::from_slice(&bytes)?;
        let public = KyberPublicKey::from_base64(&stored.public_key)?;
        let secret = KyberSecretKey::from_base64(&stored.secret_key)?;
        Ok(Some(KyberKeyPair::new(public, secret)))
    }

    /// Load the keypair for an identity or fail with `NoKeypair`
    pub fn require(&self, researcher_id: &str) -> Result<KyberKeyPair> {
        self.get(researcher_id)?
            .ok_or_else(|| ClientError::NoKeypair(researcher_id.to_string()))
    }

    /// Persist a keypair for an identity
    pub fn put(&self, researcher_id: &str, keypair: &KyberKeyPair) -> Result<()> {
        let stored = StoredKeyPair {
            public_key: keypair.public_key().to_base64(),
            secret_key: keypair.secret_key().to_base64(),
        };
        let path = self.path_for(researcher_id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&stored)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Load the keypair for an identity, generating and persisting a
    /// fresh one if absent
    ///
    /// Returns the pair and whether it was newly generated. Generation
    /// is serialized against itself: concurrent callers observe one
    /// keypair, never two racing into storage.
    pub fn ensure(&self, researcher_id: &str) -> Result<(KyberKeyPair, bool)> {
        let _guard = self.gen_lock.lock();
        if let Some(existing) = self.get(researcher_id)? {
            return Ok((existing, false));
        }
        let fresh = generate_keypair()?;
        self.put(researcher_id, &fresh)?;
        tracing::info!(researcher_id = %researcher_id, "generated new local keypair");
        Ok((fresh, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_identity_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = Keystore::open(dir.path()).unwrap();

        assert!(!store.has("alice"));
        assert!(store.get("alice").unwrap().is_none());
        assert!(matches!(
            store.require("alice").unwrap_err(),
            ClientError::NoKeypair(_)
        ));
    }

    #[test]
    fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Keystore::open(dir.path()).unwrap();

        let keypair = generate_keypair().unwrap();
        store.put("alice", &keypair).unwrap();

        let loaded = store.require("alice").unwrap();
        assert_eq!(loaded.public_key(), keypair.public_key());
        assert_eq!(
            loaded.secret_key().as_bytes()[..],
            keypair.secret_key().as_bytes()[..]
        );
    }

    #[test]
    fn test_ensure_generates_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Keystore::open(dir.path()).unwrap();

        let (first, generated) = store.ensure("alice").unwrap();
        assert!(generated);

        let (second, generated) = store.ensure("alice").unwrap();
        assert!(!generated);
        assert_eq!(first.public_key(), second.public_key());
    }

    #[test]
    fn test_identities_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = Keystore::open(dir.path()).unwrap();

        let (alice, _) = store.ensure("alice").unwrap();
        let (bob, _) = store.ensure("bob").unwrap();
        assert_ne!(alice.public_key(), bob.public_key());
    }

    #[test]
    fn test_awkward_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let store = Keystore::open(dir.path()).unwrap();

        // Identifiers are printable but not filesystem-safe
        for id in ["../escape", "a/b/c", "dots..", "white space"] {
            let (pair, _) = store.ensure(id).unwrap();
            let loaded = store.require(id).unwrap();
            assert_eq!(pair.public_key(), loaded.public_key());
        }
    }

    #[test]
    fn test_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let public = {
            let store = Keystore::open(dir.path()).unwrap();
            store.ensure("alice").unwrap().0.public_key().clone()
        };

        let store = Keystore::open(dir.path()).unwrap();
        assert_eq!(store.require("alice").unwrap().public_key(), &public);
    }
}
