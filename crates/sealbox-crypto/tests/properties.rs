//! Property-based invariants for the cipher engine

use proptest::prelude::*;
use sealbox_crypto::{
    BLOB_OVERHEAD, CryptoError, Dek, Fingerprint, KemPayload, decrypt_and_unwrap, encrypt_and_wrap,
    generate_keypair, open, rewrap, seal, unwrap_dek, wrap_dek,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn seal_open_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let dek = Dek::generate().unwrap();
        let blob = seal(&dek, &plaintext).unwrap();
        prop_assert_eq!(blob.len(), plaintext.len() + BLOB_OVERHEAD);
        let decrypted = open(&dek, &blob).unwrap();
        prop_assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn bit_flip_anywhere_is_tampered(
        plaintext in proptest::collection::vec(any::<u8>(), 1..1024),
        byte_pick in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let dek = Dek::generate().unwrap();
        let blob = seal(&dek, &plaintext).unwrap();

        let mut tampered = blob.clone();
        let idx = byte_pick.index(tampered.len());
        tampered[idx] ^= 1 << bit;

        let result = open(&dek, &tampered);
        prop_assert!(matches!(result, Err(CryptoError::Tampered)));
    }

    #[test]
    fn wrap_unwrap_identity(dek_bytes in proptest::array::uniform32(any::<u8>())) {
        let kp = generate_keypair().unwrap();
        let dek = Dek::from_bytes(&dek_bytes).unwrap();
        let payload = wrap_dek(&dek, kp.public_key()).unwrap();
        let recovered = unwrap_dek(&payload, kp.secret_key()).unwrap();
        prop_assert_eq!(recovered.as_bytes(), dek.as_bytes());
    }

    #[test]
    fn payload_split_rejects_every_other_length(len in 0usize..2048) {
        prop_assume!(len != 800);
        let bytes = vec![0u8; len];
        prop_assert!(KemPayload::from_bytes(&bytes).is_err());
    }
}

#[test]
fn roundtrip_at_the_size_limit() {
    let dek = Dek::generate().unwrap();
    let plaintext = vec![0x6Bu8; 100 * 1024 * 1024];

    let blob = seal(&dek, &plaintext).unwrap();
    assert_eq!(blob.len(), plaintext.len() + BLOB_OVERHEAD);

    let decrypted = open(&dek, &blob).unwrap();
    assert_eq!(decrypted, plaintext);
}

#[test]
fn consecutive_shares_produce_distinct_payloads() {
    let alice = generate_keypair().unwrap();
    let bob = generate_keypair().unwrap();
    let file = encrypt_and_wrap(b"fan out", alice.public_key(), None).unwrap();

    let mut seen = std::collections::HashSet::new();
    for _ in 0..16 {
        let payload = rewrap(&file.owner_wrap, alice.secret_key(), bob.public_key()).unwrap();
        assert!(seen.insert(payload.to_bytes()), "duplicate KEM payload");
    }
}

#[test]
fn fingerprint_covers_ciphertext_not_iv() {
    let owner = generate_keypair().unwrap();
    let file = encrypt_and_wrap(b"receipt", owner.public_key(), None).unwrap();

    assert_eq!(Fingerprint::compute(&file.ciphertext), file.fingerprint);

    // The full blob (IV included) hashes differently
    assert_ne!(Fingerprint::compute(&file.blob()), file.fingerprint);
}

#[test]
fn stored_fingerprint_catches_blob_swap() {
    let owner = generate_keypair().unwrap();
    let original = encrypt_and_wrap(b"original contents", owner.public_key(), None).unwrap();
    let replacement = encrypt_and_wrap(b"replaced contents", owner.public_key(), None).unwrap();

    // A blob swapped without updating the fingerprint fails closed
    let result = decrypt_and_unwrap(
        &original.owner_wrap,
        owner.secret_key(),
        &replacement.blob(),
        Some(&original.fingerprint),
    );
    assert!(matches!(result, Err(CryptoError::Tampered)));
}
