//! Encrypt-and-wrap / decrypt-and-unwrap pipelines
//!
//! Each pipeline is a straight-line sequence of explicit phases.
//! Progress is reported through a callback side channel; the
//! cryptographic steps themselves are never suspended and run to
//! completion or fail as a unit.

use crate::{
    CryptoError, IV_SIZE, MAX_PLAINTEXT_SIZE, Result,
    fingerprint::Fingerprint,
    kem::{KyberPublicKey, KyberSecretKey},
    keys::{Dek, Iv},
    symmetric::{open_with_iv, seal_with_iv},
    wrap::{KemPayload, unwrap_dek, wrap_dek},
};

/// Pipeline phases, reported to the progress callback as each begins
///
/// `Upload` and `Download` belong to the transport layer around this
/// crate; they share the enum so callers render one progress stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Drawing the data-encryption key
    KeyDraw,
    /// Drawing the AES-GCM IV
    IvDraw,
    /// Encrypting the payload
    Encrypt,
    /// Computing the ciphertext fingerprint
    Hash,
    /// Wrapping the DEK for the owner
    OwnerWrap,
    /// Transferring the blob to the server
    Upload,
    /// Fetching the blob from the server
    Download,
    /// Unwrapping the DEK and decrypting
    Decrypt,
    /// Pipeline complete
    Done,
}

/// Progress callback invoked at each phase transition
pub type ProgressFn<'a> = &'a dyn Fn(Phase);

fn report(progress: Option<ProgressFn<'_>>, phase: Phase) {
    if let Some(f) = progress {
        f(phase);
    }
}

/// The output of [`encrypt_and_wrap`]: everything an upload needs
pub struct EncryptedFile {
    /// The fresh IV drawn for this encryption
    pub iv: Iv,
    /// `ciphertext ∥ tag`, without the IV
    pub ciphertext: Vec<u8>,
    /// SHA-256 over `ciphertext ∥ tag`
    pub fingerprint: Fingerprint,
    /// The DEK wrapped against the owner's own public key
    pub owner_wrap: KemPayload,
    /// Plaintext length in bytes
    pub original_size: u64,
}

impl EncryptedFile {
    /// Assemble the self-contained `IV ∥ ciphertext ∥ tag` blob
    pub fn blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(IV_SIZE + self.ciphertext.len());
        blob.extend_from_slice(self.iv.as_bytes());
        blob.extend_from_slice(&self.ciphertext);
        blob
    }
}

/// Encrypt a plaintext and wrap its DEK for the owner
///
/// Runs `KeyDraw → IvDraw → Encrypt → Hash → OwnerWrap`. Oversize
/// inputs are rejected before any key material is drawn. The DEK is
/// wiped when this function returns, on success and on every error
/// path.
pub fn encrypt_and_wrap(
    plaintext: &[u8],
    owner: &KyberPublicKey,
    progress: Option<ProgressFn<'_>>,
) -> Result<EncryptedFile> {
    if plaintext.len() as u64 > MAX_PLAINTEXT_SIZE {
        return Err(CryptoError::DataTooLarge {
            size: plaintext.len() as u64,
            max: MAX_PLAINTEXT_SIZE,
        });
    }

    report(progress, Phase::KeyDraw);
    let dek = Dek::generate()?;

    report(progress, Phase::IvDraw);
    let iv = Iv::generate()?;

    report(progress, Phase::Encrypt);
    let ciphertext = seal_with_iv(&dek, &iv, plaintext)?;

    report(progress, Phase::Hash);
    let fingerprint = Fingerprint::compute(&ciphertext);

    report(progress, Phase::OwnerWrap);
    let owner_wrap = wrap_dek(&dek, owner)?;

    Ok(EncryptedFile {
        iv,
        ciphertext,
        fingerprint,
        owner_wrap,
        original_size: plaintext.len() as u64,
    })
}

/// Re-wrap a file's DEK for a new recipient
///
/// Unwraps the owner-wrap with the owner's secret key, then performs a
/// fresh encapsulation against the recipient's public key. Consecutive
/// calls for the same recipient produce distinct payloads.
pub fn rewrap(
    owner_wrap: &KemPayload,
    owner_secret: &KyberSecretKey,
    recipient: &KyberPublicKey,
) -> Result<KemPayload> {
    let dek = unwrap_dek(owner_wrap, owner_secret)?;
    wrap_dek(&dek, recipient)
}

/// Unwrap a DEK and decrypt a blob addressed to the caller
///
/// When a fingerprint is supplied it is checked over `ciphertext ∥ tag`
/// before decryption; a mismatch is `Tampered` and fatal. A GCM tag
/// failure likewise yields `Tampered` with no plaintext.
pub fn decrypt_and_unwrap(
    payload: &KemPayload,
    secret: &KyberSecretKey,
    blob: &[u8],
    expected_fingerprint: Option<&Fingerprint>,
) -> Result<Vec<u8>> {
    if blob.len() < IV_SIZE {
        return Err(CryptoError::Tampered);
    }
    let (iv_bytes, ciphertext) = blob.split_at(IV_SIZE);

    if let Some(expected) = expected_fingerprint {
        if !expected.matches(ciphertext) {
            return Err(CryptoError::Tampered);
        }
    }

    let iv = Iv::from_bytes(iv_bytes)?;
    let dek = unwrap_dek(payload, secret)?;
    open_with_iv(&dek, &iv, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kem::generate_keypair;
    use std::cell::RefCell;

    #[test]
    fn test_owner_roundtrip() {
        let owner = generate_keypair().unwrap();
        let plaintext = b"Hi\n";

        let file = encrypt_and_wrap(plaintext, owner.public_key(), None).unwrap();
        assert_eq!(file.original_size, 3);
        assert_eq!(file.blob().len(), 31);

        let decrypted = decrypt_and_unwrap(
            &file.owner_wrap,
            owner.secret_key(),
            &file.blob(),
            Some(&file.fingerprint),
        )
        .unwrap();

        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_cross_identity_roundtrip() {
        let alice = generate_keypair().unwrap();
        let bob = generate_keypair().unwrap();
        let plaintext = vec![0xABu8; 64 * 1024];

        let file = encrypt_and_wrap(&plaintext, alice.public_key(), None).unwrap();
        let bob_wrap = rewrap(&file.owner_wrap, alice.secret_key(), bob.public_key()).unwrap();

        let decrypted = decrypt_and_unwrap(
            &bob_wrap,
            bob.secret_key(),
            &file.blob(),
            Some(&file.fingerprint),
        )
        .unwrap();

        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn test_phases_reported_in_order() {
        let owner = generate_keypair().unwrap();
        let phases = RefCell::new(Vec::new());
        let cb = |p: Phase| phases.borrow_mut().push(p);

        encrypt_and_wrap(b"data", owner.public_key(), Some(&cb)).unwrap();

        assert_eq!(
            *phases.borrow(),
            vec![
                Phase::KeyDraw,
                Phase::IvDraw,
                Phase::Encrypt,
                Phase::Hash,
                Phase::OwnerWrap,
            ]
        );
    }

    #[test]
    fn test_oversize_rejected_before_phases() {
        let owner = generate_keypair().unwrap();
        let phases = RefCell::new(Vec::new());
        let cb = |p: Phase| phases.borrow_mut().push(p);

        let big = vec![0u8; (MAX_PLAINTEXT_SIZE as usize) + 1];
        let result = encrypt_and_wrap(&big, owner.public_key(), Some(&cb));

        assert!(matches!(result, Err(CryptoError::DataTooLarge { .. })));
        assert!(phases.borrow().is_empty());
    }

    #[test]
    fn test_rewrap_payloads_differ() {
        let alice = generate_keypair().unwrap();
        let bob = generate_keypair().unwrap();

        let file = encrypt_and_wrap(b"shared twice", alice.public_key(), None).unwrap();
        let w1 = rewrap(&file.owner_wrap, alice.secret_key(), bob.public_key()).unwrap();
        let w2 = rewrap(&file.owner_wrap, alice.secret_key(), bob.public_key()).unwrap();

        assert_ne!(w1.to_bytes(), w2.to_bytes());
    }

    #[test]
    fn test_fingerprint_mismatch_is_tampered() {
        let owner = generate_keypair().unwrap();
        let file = encrypt_and_wrap(b"verify me", owner.public_key(), None).unwrap();

        let wrong = Fingerprint::compute(b"some other bytes");
        let result = decrypt_and_unwrap(
            &file.owner_wrap,
            owner.secret_key(),
            &file.blob(),
            Some(&wrong),
        );

        assert!(matches!(result, Err(CryptoError::Tampered)));
    }

    #[test]
    fn test_tampered_blob_yields_no_plaintext() {
        let owner = generate_keypair().unwrap();
        let plaintext = vec![0x55u8; 2048];
        let file = encrypt_and_wrap(&plaintext, owner.public_key(), None).unwrap();

        let mut blob = file.blob();
        blob[1000] ^= 0x01;

        // Without the fingerprint the GCM tag still catches it
        let result = decrypt_and_unwrap(&file.owner_wrap, owner.secret_key(), &blob, None);
        assert!(matches!(result, Err(CryptoError::Tampered)));
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let owner = generate_keypair().unwrap();
        let file = encrypt_and_wrap(b"", owner.public_key(), None).unwrap();
        assert_eq!(file.blob().len(), 28);

        let decrypted =
            decrypt_and_unwrap(&file.owner_wrap, owner.secret_key(), &file.blob(), None).unwrap();
        assert!(decrypted.is_empty());
    }
}
