//! # Sealbox Crypto
//!
//! Client-side cryptography for the sealbox end-to-end encrypted
//! file-sharing service.
//!
//! ## Hybrid scheme
//!
//! Every file is encrypted once with a fresh symmetric key and that key
//! is then wrapped separately for each party who may read it:
//!
//! - **AES-256-GCM**: authenticated encryption of the file payload under
//!   a random 32-byte data-encryption key (DEK)
//! - **Kyber-512 (ML-KEM-512)**: per-recipient key encapsulation; the
//!   32-byte shared secret is XORed over the DEK to form the wrap
//! - **SHA-256**: ciphertext fingerprint exchanged as an integrity
//!   receipt between client and server
//!
//! The storage server only ever sees the encrypted blob, the 800-byte
//! KEM payloads, and the fingerprint. It holds no key material and
//! cannot recover plaintext.
//!
//! ## Wire formats
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  Ciphertext blob                     │
//! ├──────────────┬───────────────────────┬───────────────┤
//! │ IV (12 bytes)│ AES-GCM ciphertext    │ tag (16 bytes)│
//! └──────────────┴───────────────────────┴───────────────┘
//!
//! ┌──────────────────────────────────────────────────────┐
//! │                KEM payload (800 bytes)               │
//! ├───────────────────────────────┬──────────────────────┤
//! │ Kyber-512 ciphertext (768 B)  │ wrapped DEK (32 B)   │
//! └───────────────────────────────┴──────────────────────┘
//! ```
//!
//! Binary values cross JSON boundaries as base64; fingerprints travel as
//! lowercase hex. Inside this crate everything is a length-typed byte
//! newtype so the payload split and the XOR wrap are total functions.
//!
//! ## Security model
//!
//! All encryption happens client-side. Kyber secret keys never leave the
//! local keystore. There is no forward secrecy: compromise of a
//! long-term secret key discloses every payload ever wrapped to it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sealbox_crypto::{kem, engine};
//!
//! let owner = kem::generate_keypair()?;
//! let file = engine::encrypt_and_wrap(b"hello", owner.public_key(), None)?;
//! let blob = file.blob();
//! let plain = engine::decrypt_and_unwrap(
//!     &file.owner_wrap,
//!     owner.secret_key(),
//!     &blob,
//!     Some(&file.fingerprint),
//! )?;
//! assert_eq!(plain, b"hello");
//! ```

pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod kem;
pub mod keys;
pub mod symmetric;
pub mod wrap;

pub use engine::{EncryptedFile, Phase, ProgressFn, decrypt_and_unwrap, encrypt_and_wrap, rewrap};
pub use error::{CryptoError, Result};
pub use fingerprint::Fingerprint;
pub use kem::{KemCiphertext, KyberKeyPair, KyberPublicKey, KyberSecretKey, decapsulate, encapsulate, generate_keypair};
pub use keys::{Dek, Iv, SharedSecret};
pub use symmetric::{open, seal};
pub use wrap::{KemPayload, WrappedDek, unwrap_dek, wrap_dek};

/// Size of a data-encryption key in bytes (AES-256)
pub const DEK_SIZE: usize = 32;

/// Size of an AES-GCM IV in bytes (96 bits)
pub const IV_SIZE: usize = 12;

/// Size of an AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Size of a Kyber-512 public key in bytes
pub const KYBER_PUBLIC_KEY_SIZE: usize = pqc_kyber::KYBER_PUBLICKEYBYTES;

/// Size of a Kyber-512 secret key in bytes
pub const KYBER_SECRET_KEY_SIZE: usize = pqc_kyber::KYBER_SECRETKEYBYTES;

/// Size of a Kyber-512 encapsulation ciphertext in bytes
pub const KEM_CIPHERTEXT_SIZE: usize = pqc_kyber::KYBER_CIPHERTEXTBYTES;

/// Size of the Kyber shared secret / wrapped DEK in bytes
pub const SHARED_SECRET_SIZE: usize = pqc_kyber::KYBER_SSBYTES;

/// Size of a single-recipient KEM payload: `kem_ct ∥ wrapped_dek`
pub const KEM_PAYLOAD_SIZE: usize = KEM_CIPHERTEXT_SIZE + DEK_SIZE;

/// Fixed overhead a blob adds over its plaintext: IV plus GCM tag
pub const BLOB_OVERHEAD: usize = IV_SIZE + TAG_SIZE;

/// Maximum plaintext size accepted for encryption (100 MiB)
pub const MAX_PLAINTEXT_SIZE: u64 = 100 * 1024 * 1024;

#[cfg(test)]
mod size_tests {
    use super::*;

    #[test]
    fn kyber512_parameter_set() {
        assert_eq!(KYBER_PUBLIC_KEY_SIZE, 800);
        assert_eq!(KYBER_SECRET_KEY_SIZE, 1632);
        assert_eq!(KEM_CIPHERTEXT_SIZE, 768);
        assert_eq!(SHARED_SECRET_SIZE, 32);
        assert_eq!(KEM_PAYLOAD_SIZE, 800);
        assert_eq!(BLOB_OVERHEAD, 28);
    }
}
