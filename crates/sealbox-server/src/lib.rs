//! # Sealbox Server
//!
//! Zero-trust storage and rendezvous server for the sealbox end-to-end
//! encrypted file-sharing service.
//!
//! The server persists opaque ciphertext blobs, indexes metadata, and
//! routes wrapped keys between identities. It never sees plaintext,
//! data-encryption keys, or private keys; every payload it stores is
//! either AES-GCM ciphertext or an 800-byte Kyber-512 KEM payload it
//! cannot unwrap.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  HTTP Clients                       │
//! │         (sealbox-client, curl, browsers)            │
//! └─────────────────────────┬───────────────────────────┘
//!                           │ bearer sessions
//! ┌─────────────────────────▼───────────────────────────┐
//! │                  Sealbox Server                     │
//! ├─────────────────────────────────────────────────────┤
//! │  Auth Middleware │ Rate Limiter │ Request Ids       │
//! ├─────────────────────────────────────────────────────┤
//! │  Identity Registry │ Share Ledger │ Groups          │
//! ├─────────────────────────────────────────────────────┤
//! │            Durable ledger (snapshot store)          │
//! ├─────────────────────────────────────────────────────┤
//! │            Blob store (filesystem / memory)         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod blobstore;
pub mod config;
pub mod error;
pub mod files;
pub mod groups;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod registry;
pub mod routes;
pub mod server;
pub mod state;
pub mod store;

pub use blobstore::{BlobStore, FlexibleBlobStore, FsBlobStore, MemoryBlobStore};
pub use config::ServerConfig;
pub use error::{ApiError, ErrorKind};
pub use files::{FileIndex, NewFileParams};
pub use groups::{GroupInfo, GroupService, MemberKey};
pub use ledger::{FetchedShare, IncomingShare, OutgoingShare, SHARE_CODE_LEN, ShareLedger};
pub use registry::{IdentityMatch, IdentitySnapshot, Registry};
pub use routes::create_router;
pub use server::{run_server, run_server_with_shutdown, run_with_listener};
pub use state::{AppState, SessionContext};
pub use store::{Db, GroupRole, Permission};
