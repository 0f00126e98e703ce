//! DEK wrapping: the 800-byte KEM payload
//!
//! A wrapped key is `DEK XOR shared_secret` where the shared secret
//! comes from one fresh Kyber-512 encapsulation. The secret is exactly
//! DEK-length and IND-CCA2, so the XOR is a one-time-pad wrap over a
//! single independent secret. Each shared secret is consumed by exactly
//! one wrap and then discarded; the wire format assumes raw XOR, so no
//! additional keys are ever derived from it.

use crate::{
    CryptoError, DEK_SIZE, KEM_CIPHERTEXT_SIZE, KEM_PAYLOAD_SIZE, Result,
    kem::{KemCiphertext, KyberPublicKey, KyberSecretKey, decapsulate, encapsulate},
    keys::{Dek, SharedSecret},
};

/// A DEK masked by a Kyber shared secret (32 bytes)
///
/// Meaningless without the matching KEM ciphertext and the recipient's
/// secret key; safe to store and transport in the clear.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedDek {
    bytes: [u8; DEK_SIZE],
}

impl WrappedDek {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != DEK_SIZE {
            return Err(CryptoError::BadPayload(format!(
                "wrapped DEK must be {} bytes, got {}",
                DEK_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; DEK_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the wrapped bytes
    pub fn as_bytes(&self) -> &[u8; DEK_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for WrappedDek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WrappedDek({} bytes)", DEK_SIZE)
    }
}

/// A single-recipient KEM payload: `kem_ct(768) ∥ wrapped_dek(32)`
///
/// The unit the share ledger stores and routes. Opaque to the server.
#[derive(Clone, PartialEq, Eq)]
pub struct KemPayload {
    kem_ct: KemCiphertext,
    wrapped: WrappedDek,
}

impl KemPayload {
    /// Assemble from parts
    pub fn new(kem_ct: KemCiphertext, wrapped: WrappedDek) -> Self {
        Self { kem_ct, wrapped }
    }

    /// Split an 800-byte payload into its parts
    ///
    /// Total on all inputs: any other length is `BadPayload`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEM_PAYLOAD_SIZE {
            return Err(CryptoError::BadPayload(format!(
                "KEM payload must be {} bytes, got {}",
                KEM_PAYLOAD_SIZE,
                bytes.len()
            )));
        }
        Ok(Self {
            kem_ct: KemCiphertext::from_bytes(&bytes[..KEM_CIPHERTEXT_SIZE])?,
            wrapped: WrappedDek::from_bytes(&bytes[KEM_CIPHERTEXT_SIZE..])?,
        })
    }

    /// Serialize to the 800-byte wire form
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(KEM_PAYLOAD_SIZE);
        bytes.extend_from_slice(self.kem_ct.as_bytes());
        bytes.extend_from_slice(self.wrapped.as_bytes());
        bytes
    }

    /// Get the KEM ciphertext half
    pub fn kem_ct(&self) -> &KemCiphertext {
        &self.kem_ct
    }

    /// Get the wrapped-DEK half
    pub fn wrapped(&self) -> &WrappedDek {
        &self.wrapped
    }

    /// Encode as base64
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(self.to_bytes())
    }

    /// Decode from base64
    pub fn from_base64(s: &str) -> Result<Self> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD.decode(s)?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for KemPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KemPayload({} bytes)", KEM_PAYLOAD_SIZE)
    }
}

fn xor_mask(dek: &Dek, ss: &SharedSecret) -> [u8; DEK_SIZE] {
    let mut out = [0u8; DEK_SIZE];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = dek.as_bytes()[i] ^ ss.as_bytes()[i];
    }
    out
}

/// Wrap a DEK for a recipient
///
/// Performs one fresh encapsulation against the recipient's public key
/// and masks the DEK with the resulting shared secret. Two wraps of the
/// same DEK for the same recipient produce different payloads.
pub fn wrap_dek(dek: &Dek, recipient: &KyberPublicKey) -> Result<KemPayload> {
    let (kem_ct, ss) = encapsulate(recipient)?;
    let wrapped = WrappedDek {
        bytes: xor_mask(dek, &ss),
    };
    Ok(KemPayload { kem_ct, wrapped })
}

/// Unwrap a DEK with the recipient's secret key
pub fn unwrap_dek(payload: &KemPayload, secret: &KyberSecretKey) -> Result<Dek> {
    let ss = decapsulate(&payload.kem_ct, secret)?;
    let mut bytes = [0u8; DEK_SIZE];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = payload.wrapped.as_bytes()[i] ^ ss.as_bytes()[i];
    }
    Dek::from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kem::generate_keypair;

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let kp = generate_keypair().unwrap();
        let dek = Dek::generate().unwrap();

        let payload = wrap_dek(&dek, kp.public_key()).unwrap();
        let recovered = unwrap_dek(&payload, kp.secret_key()).unwrap();

        assert_eq!(dek.as_bytes(), recovered.as_bytes());
    }

    #[test]
    fn test_payload_wire_size() {
        let kp = generate_keypair().unwrap();
        let dek = Dek::generate().unwrap();
        let payload = wrap_dek(&dek, kp.public_key()).unwrap();
        assert_eq!(payload.to_bytes().len(), 800);
    }

    #[test]
    fn test_payload_split_is_total() {
        assert!(KemPayload::from_bytes(&[0u8; 799]).is_err());
        assert!(KemPayload::from_bytes(&[0u8; 801]).is_err());
        assert!(KemPayload::from_bytes(&[]).is_err());
        assert!(KemPayload::from_bytes(&[0u8; 800]).is_ok());
    }

    #[test]
    fn test_payload_bytes_roundtrip() {
        let kp = generate_keypair().unwrap();
        let dek = Dek::generate().unwrap();
        let payload = wrap_dek(&dek, kp.public_key()).unwrap();
        let restored = KemPayload::from_bytes(&payload.to_bytes()).unwrap();
        assert_eq!(payload, restored);
    }

    #[test]
    fn test_payload_base64_roundtrip() {
        let kp = generate_keypair().unwrap();
        let dek = Dek::generate().unwrap();
        let payload = wrap_dek(&dek, kp.public_key()).unwrap();
        let restored = KemPayload::from_base64(&payload.to_base64()).unwrap();
        assert_eq!(payload, restored);
    }

    #[test]
    fn test_wraps_differ_for_same_recipient() {
        let kp = generate_keypair().unwrap();
        let dek = Dek::generate().unwrap();

        let p1 = wrap_dek(&dek, kp.public_key()).unwrap();
        let p2 = wrap_dek(&dek, kp.public_key()).unwrap();

        assert_ne!(p1.to_bytes(), p2.to_bytes());
        // Both still unwrap to the same DEK
        assert_eq!(
            unwrap_dek(&p1, kp.secret_key()).unwrap().as_bytes(),
            unwrap_dek(&p2, kp.secret_key()).unwrap().as_bytes()
        );
    }

    #[test]
    fn test_unwrap_with_wrong_key_yields_wrong_dek() {
        let alice = generate_keypair().unwrap();
        let bob = generate_keypair().unwrap();
        let dek = Dek::generate().unwrap();

        let payload = wrap_dek(&dek, alice.public_key()).unwrap();
        let wrong = unwrap_dek(&payload, bob.secret_key()).unwrap();

        assert_ne!(dek.as_bytes(), wrong.as_bytes());
    }
}
