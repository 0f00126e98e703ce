//! # Sealbox Client
//!
//! Client library for the sealbox end-to-end encrypted file-sharing
//! service.
//!
//! This crate owns the two pieces that never leave the user's machine:
//!
//! - **Local keystore**: a durable directory of Kyber-512 keypairs
//!   keyed by identifier. Private keys are generated here, stay here,
//!   and are wiped by nobody - logout leaves the store intact, and a
//!   lost keystore means permanent loss of decrypt capability.
//! - **Cipher pipelines**: upload encrypts with a fresh AES-256-GCM
//!   DEK and wraps it for the owner; share unwraps and re-wraps for
//!   each recipient; receive decapsulates, verifies the fingerprint,
//!   and decrypts.
//!
//! The server sees ciphertext, 800-byte KEM payloads, and SHA-256
//! fingerprints - nothing else.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sealbox_client::{ClientConfig, SealboxClient, Permission};
//!
//! let mut client = SealboxClient::new(ClientConfig::new("http://localhost:8420"))?;
//! client.register("alice", "correct-horse").await?;
//!
//! let meta = client.upload("notes.txt", "text/plain", b"hello", None).await?;
//! let share = client.share_with(meta.file_id, "bob", Permission::Download).await?;
//! println!("share code: {}", share.share_code);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod keystore;
pub mod types;

pub use client::{Progress, SealboxClient};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use keystore::Keystore;
pub use types::{
    AuthResponse, FetchedShare, FileMeta, GroupInfo, GroupMember, GroupRole, IdentityMatch,
    IncomingShare, MemberKey, OutgoingShare, Permission, ReceivedFile, SessionInfo, ShareCreated,
};
