//! Kyber-512 key encapsulation
//!
//! Thin typed layer over `pqc_kyber` built with the `kyber512` feature,
//! the ML-KEM-512 parameter set: 800-byte public keys, 1632-byte secret
//! keys, 768-byte encapsulation ciphertexts, 32-byte shared secrets.
//!
//! Decapsulation uses implicit rejection: a tampered ciphertext of the
//! right length yields a wrong shared secret rather than an error, and
//! the mismatch surfaces as an authentication failure when the unwrapped
//! DEK meets the GCM tag.

use crate::{
    CryptoError, KEM_CIPHERTEXT_SIZE, KYBER_PUBLIC_KEY_SIZE, KYBER_SECRET_KEY_SIZE, Result,
    keys::SharedSecret,
};
use pqc_kyber::{decapsulate as kyber_decapsulate, encapsulate as kyber_encapsulate, keypair as kyber_keypair};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// RNG bridge from getrandom to the rand_core 0.6 traits pqc_kyber
/// re-exports
struct KyberRng;

impl pqc_kyber::RngCore for KyberRng {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        getrandom::getrandom(&mut buf).expect("getrandom failed");
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        getrandom::getrandom(&mut buf).expect("getrandom failed");
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        getrandom::getrandom(dest).expect("getrandom failed");
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> core::result::Result<(), rand::Error> {
        getrandom::getrandom(dest).map_err(|_| {
            rand::Error::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "getrandom failed",
            ))
        })
    }
}

impl pqc_kyber::CryptoRng for KyberRng {}

/// A Kyber-512 public key (800 bytes)
#[derive(Clone, PartialEq, Eq)]
pub struct KyberPublicKey {
    bytes: [u8; KYBER_PUBLIC_KEY_SIZE],
}

impl KyberPublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KYBER_PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "Kyber public key must be {} bytes, got {}",
                KYBER_PUBLIC_KEY_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; KYBER_PUBLIC_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KYBER_PUBLIC_KEY_SIZE] {
        &self.bytes
    }

    /// Encode as base64
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(self.bytes)
    }

    /// Decode from base64
    pub fn from_base64(s: &str) -> Result<Self> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD.decode(s)?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for KyberPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KyberPublicKey(kyber512, {} bytes)", KYBER_PUBLIC_KEY_SIZE)
    }
}

/// A Kyber-512 secret key (1632 bytes)
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KyberSecretKey {
    bytes: [u8; KYBER_SECRET_KEY_SIZE],
}

impl KyberSecretKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KYBER_SECRET_KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "Kyber secret key must be {} bytes, got {}",
                KYBER_SECRET_KEY_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; KYBER_SECRET_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the key bytes (handle with care - secret material)
    pub fn as_bytes(&self) -> &[u8; KYBER_SECRET_KEY_SIZE] {
        &self.bytes
    }

    /// Derive the public key embedded in the secret key
    ///
    /// pqc_kyber secret keys carry the public key in their trailing
    /// bytes.
    pub fn public_key(&self) -> KyberPublicKey {
        let mut pk = [0u8; KYBER_PUBLIC_KEY_SIZE];
        let start = KYBER_SECRET_KEY_SIZE - KYBER_PUBLIC_KEY_SIZE - 64;
        pk.copy_from_slice(&self.bytes[start..start + KYBER_PUBLIC_KEY_SIZE]);
        KyberPublicKey { bytes: pk }
    }

    /// Encode as base64
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(self.bytes)
    }

    /// Decode from base64
    pub fn from_base64(s: &str) -> Result<Self> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD.decode(s)?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for KyberSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KyberSecretKey(kyber512, [REDACTED])")
    }
}

/// A Kyber-512 key pair
#[derive(Clone)]
pub struct KyberKeyPair {
    secret: KyberSecretKey,
    public: KyberPublicKey,
}

impl std::fmt::Debug for KyberKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KyberKeyPair")
            .field("secret", &self.secret)
            .field("public", &self.public)
            .finish()
    }
}

impl KyberKeyPair {
    /// Assemble from existing halves
    pub fn new(public: KyberPublicKey, secret: KyberSecretKey) -> Self {
        Self { secret, public }
    }

    /// Get the secret key
    pub fn secret_key(&self) -> &KyberSecretKey {
        &self.secret
    }

    /// Get the public key
    pub fn public_key(&self) -> &KyberPublicKey {
        &self.public
    }
}

/// A Kyber-512 encapsulation ciphertext (768 bytes)
#[derive(Clone, PartialEq, Eq)]
pub struct KemCiphertext {
    bytes: [u8; KEM_CIPHERTEXT_SIZE],
}

impl KemCiphertext {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEM_CIPHERTEXT_SIZE {
            return Err(CryptoError::BadPayload(format!(
                "KEM ciphertext must be {} bytes, got {}",
                KEM_CIPHERTEXT_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; KEM_CIPHERTEXT_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the ciphertext bytes
    pub fn as_bytes(&self) -> &[u8; KEM_CIPHERTEXT_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for KemCiphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KemCiphertext({} bytes)", KEM_CIPHERTEXT_SIZE)
    }
}

/// Generate a fresh Kyber-512 key pair from OS randomness
pub fn generate_keypair() -> Result<KyberKeyPair> {
    let keys = kyber_keypair(&mut KyberRng)
        .map_err(|e| CryptoError::Rng(format!("Kyber keypair generation failed: {:?}", e)))?;
    Ok(KyberKeyPair {
        public: KyberPublicKey { bytes: keys.public },
        secret: KyberSecretKey { bytes: keys.secret },
    })
}

/// Encapsulate a fresh shared secret against a recipient's public key
///
/// Every call draws fresh randomness; ciphertexts and secrets differ
/// across calls even for the same recipient.
pub fn encapsulate(recipient: &KyberPublicKey) -> Result<(KemCiphertext, SharedSecret)> {
    let (ct, ss) = kyber_encapsulate(&recipient.bytes, &mut KyberRng)
        .map_err(|e| CryptoError::Encryption(format!("Kyber encapsulation failed: {:?}", e)))?;
    Ok((KemCiphertext { bytes: ct }, SharedSecret::new(ss)))
}

/// Recover the shared secret from an encapsulation ciphertext
pub fn decapsulate(ct: &KemCiphertext, secret: &KyberSecretKey) -> Result<SharedSecret> {
    let ss = kyber_decapsulate(&ct.bytes, &secret.bytes)
        .map_err(|e| CryptoError::BadPayload(format!("Kyber decapsulation failed: {:?}", e)))?;
    Ok(SharedSecret::new(ss))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sizes() {
        let kp = generate_keypair().unwrap();
        assert_eq!(kp.public_key().as_bytes().len(), 800);
        assert_eq!(kp.secret_key().as_bytes().len(), 1632);
    }

    #[test]
    fn test_encapsulate_decapsulate() {
        let kp = generate_keypair().unwrap();
        let (ct, sender_ss) = encapsulate(kp.public_key()).unwrap();
        let recipient_ss = decapsulate(&ct, kp.secret_key()).unwrap();
        assert_eq!(sender_ss.as_bytes(), recipient_ss.as_bytes());
    }

    #[test]
    fn test_encapsulations_are_unique() {
        let kp = generate_keypair().unwrap();
        let (ct1, ss1) = encapsulate(kp.public_key()).unwrap();
        let (ct2, ss2) = encapsulate(kp.public_key()).unwrap();
        assert_ne!(ct1.as_bytes()[..], ct2.as_bytes()[..]);
        assert_ne!(ss1.as_bytes(), ss2.as_bytes());
    }

    #[test]
    fn test_wrong_secret_key_yields_wrong_secret() {
        let alice = generate_keypair().unwrap();
        let mallory = generate_keypair().unwrap();
        let (ct, ss) = encapsulate(alice.public_key()).unwrap();
        // Implicit rejection: decapsulation succeeds but the secret differs
        let wrong = decapsulate(&ct, mallory.secret_key()).unwrap();
        assert_ne!(ss.as_bytes(), wrong.as_bytes());
    }

    #[test]
    fn test_public_key_embedded_in_secret() {
        let kp = generate_keypair().unwrap();
        let derived = kp.secret_key().public_key();
        assert_eq!(kp.public_key(), &derived);
    }

    #[test]
    fn test_public_key_base64_roundtrip() {
        let kp = generate_keypair().unwrap();
        let b64 = kp.public_key().to_base64();
        let decoded = KyberPublicKey::from_base64(&b64).unwrap();
        assert_eq!(kp.public_key(), &decoded);
    }

    #[test]
    fn test_wrong_length_keys_rejected() {
        assert!(KyberPublicKey::from_bytes(&[0u8; 799]).is_err());
        assert!(KyberPublicKey::from_bytes(&[0u8; 801]).is_err());
        assert!(KyberSecretKey::from_bytes(&[0u8; 800]).is_err());
        assert!(KemCiphertext::from_bytes(&[0u8; 767]).is_err());
    }
}
