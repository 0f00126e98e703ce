//! AES-256-GCM payload encryption
//!
//! Blobs use the layout `IV(12) ∥ ciphertext ∥ tag(16)` with no header,
//! length prefix, or magic bytes. Encryption draws a fresh IV per call;
//! decryption authenticates before releasing a single plaintext byte.

use crate::{
    BLOB_OVERHEAD, CryptoError, IV_SIZE, MAX_PLAINTEXT_SIZE, Result,
    keys::{Dek, Iv},
};
use aes_gcm::{
    Aes256Gcm, KeyInit,
    aead::Aead as AeadTrait,
};

/// Encrypt a plaintext under a DEK with a caller-supplied IV
///
/// Returns `ciphertext ∥ tag` without the IV; used when the IV travels
/// separately on the wire.
pub fn seal_with_iv(dek: &Dek, iv: &Iv, plaintext: &[u8]) -> Result<Vec<u8>> {
    if plaintext.len() as u64 > MAX_PLAINTEXT_SIZE {
        return Err(CryptoError::DataTooLarge {
            size: plaintext.len() as u64,
            max: MAX_PLAINTEXT_SIZE,
        });
    }
    let cipher = Aes256Gcm::new_from_slice(dek.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let nonce = aes_gcm::Nonce::from_slice(iv.as_bytes());
    cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

/// Encrypt a plaintext under a DEK into a self-contained blob
///
/// Draws a fresh random IV and returns `IV ∥ ciphertext ∥ tag`. An empty
/// plaintext yields exactly a 28-byte blob.
pub fn seal(dek: &Dek, plaintext: &[u8]) -> Result<Vec<u8>> {
    // Size check happens in seal_with_iv before the IV is drawn
    if plaintext.len() as u64 > MAX_PLAINTEXT_SIZE {
        return Err(CryptoError::DataTooLarge {
            size: plaintext.len() as u64,
            max: MAX_PLAINTEXT_SIZE,
        });
    }
    let iv = Iv::generate()?;
    let ct = seal_with_iv(dek, &iv, plaintext)?;
    let mut blob = Vec::with_capacity(IV_SIZE + ct.len());
    blob.extend_from_slice(iv.as_bytes());
    blob.extend_from_slice(&ct);
    Ok(blob)
}

/// Decrypt `ciphertext ∥ tag` under a DEK and explicit IV
pub fn open_with_iv(dek: &Dek, iv: &Iv, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(dek.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let nonce = aes_gcm::Nonce::from_slice(iv.as_bytes());
    // Any authentication failure collapses to Tampered; no partial
    // plaintext ever escapes
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Tampered)
}

/// Decrypt a self-contained `IV ∥ ciphertext ∥ tag` blob under a DEK
pub fn open(dek: &Dek, blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < BLOB_OVERHEAD {
        return Err(CryptoError::Tampered);
    }
    let iv = Iv::from_bytes(&blob[..IV_SIZE])?;
    open_with_iv(dek, &iv, &blob[IV_SIZE..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TAG_SIZE;

    #[test]
    fn test_seal_open_roundtrip() {
        let dek = Dek::generate().unwrap();
        let plaintext = b"Hello, World!";

        let blob = seal(&dek, plaintext).unwrap();
        let decrypted = open(&dek, &blob).unwrap();

        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_blob_length_arithmetic() {
        let dek = Dek::generate().unwrap();
        let plaintext = b"Hi\n";

        let blob = seal(&dek, plaintext).unwrap();
        assert_eq!(blob.len(), 3 + IV_SIZE + TAG_SIZE);
        assert_eq!(blob.len(), 31);
    }

    #[test]
    fn test_empty_plaintext() {
        let dek = Dek::generate().unwrap();

        let blob = seal(&dek, b"").unwrap();
        assert_eq!(blob.len(), BLOB_OVERHEAD);

        let decrypted = open(&dek, &blob).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_wrong_key_fails() {
        let dek1 = Dek::generate().unwrap();
        let dek2 = Dek::generate().unwrap();

        let blob = seal(&dek1, b"Secret message").unwrap();
        let result = open(&dek2, &blob);

        assert!(matches!(result, Err(CryptoError::Tampered)));
    }

    #[test]
    fn test_every_bit_flip_detected() {
        let dek = Dek::generate().unwrap();
        let blob = seal(&dek, b"Authenticated message").unwrap();

        // Flip a single bit in every byte past the IV in turn
        for i in IV_SIZE..blob.len() {
            let mut tampered = blob.clone();
            tampered[i] ^= 0x01;
            let result = open(&dek, &tampered);
            assert!(
                matches!(result, Err(CryptoError::Tampered)),
                "flip at byte {} was not detected",
                i
            );
        }
    }

    #[test]
    fn test_tampered_iv_fails() {
        let dek = Dek::generate().unwrap();
        let mut blob = seal(&dek, b"IV-bound message").unwrap();
        blob[0] ^= 0xFF;
        assert!(matches!(open(&dek, &blob), Err(CryptoError::Tampered)));
    }

    #[test]
    fn test_truncated_blob_fails() {
        let dek = Dek::generate().unwrap();
        let blob = seal(&dek, b"Message to truncate").unwrap();

        assert!(open(&dek, &blob[..blob.len() - 1]).is_err());
        assert!(open(&dek, &blob[..BLOB_OVERHEAD - 1]).is_err());
        assert!(open(&dek, &[]).is_err());
    }

    #[test]
    fn test_ciphertexts_differ_per_call() {
        let dek = Dek::generate().unwrap();
        let blob1 = seal(&dek, b"Same message").unwrap();
        let blob2 = seal(&dek, b"Same message").unwrap();
        assert_ne!(blob1, blob2);
    }

    #[test]
    fn test_oversize_plaintext_rejected() {
        let dek = Dek::generate().unwrap();
        let just_over = vec![0u8; (MAX_PLAINTEXT_SIZE as usize) + 1];
        let result = seal(&dek, &just_over);
        assert!(matches!(result, Err(CryptoError::DataTooLarge { .. })));
    }

    #[test]
    fn test_large_message_roundtrip() {
        let dek = Dek::generate().unwrap();
        let plaintext = vec![0x42u8; 1024 * 1024];

        let blob = seal(&dek, &plaintext).unwrap();
        let decrypted = open(&dek, &blob).unwrap();

        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn test_all_byte_values() {
        let dek = Dek::generate().unwrap();
        let plaintext: Vec<u8> = (0..=255).collect();

        let blob = seal(&dek, &plaintext).unwrap();
        let decrypted = open(&dek, &blob).unwrap();

        assert_eq!(plaintext, decrypted);
    }
}
