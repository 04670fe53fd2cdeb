//! Integration tests for the symmetric primitives
//!
//! The AEAD is checked byte-for-byte against the RustCrypto
//! `chacha20poly1305` crate, and the incremental hash and MAC forms are
//! checked against their one-shot forms under arbitrary splits.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use proptest::prelude::*;

use qsafe_random::Csprng;
use qsafe_symmetric::{aead, blake2b, poly1305, Blake2b, ChaCha20, ChaCha20Poly1305, Poly1305, XSalsa20};

mod cross_library_tests {
    use super::*;

    fn reference_seal(key: &[u8], nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> Vec<u8> {
        let cipher = chacha20poly1305::ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(key));
        cipher
            .encrypt(
                chacha20poly1305::Nonce::from_slice(nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .expect("reference encryption failed")
    }

    #[test]
    fn test_matches_reference_for_random_inputs() {
        let (rng, _) = Csprng::with_defaults().unwrap();

        for len in [0usize, 1, 15, 16, 17, 63, 64, 65, 1000] {
            let key = rng.random_bytes(32).unwrap();
            let nonce = rng.random_bytes(12).unwrap();
            let plaintext = rng.random_bytes(len).unwrap();
            let aad = rng.random_bytes(len % 29).unwrap();

            let (ciphertext, tag) = aead::encrypt(&plaintext, &key, &nonce, &aad).unwrap();
            let mut ours = ciphertext.clone();
            ours.extend_from_slice(&tag);

            let reference = reference_seal(&key, &nonce, &plaintext, &aad);
            assert_eq!(ours, reference, "mismatch for length {}", len);
        }
    }

    #[test]
    fn test_opens_reference_ciphertext() {
        let key = [0x5au8; 32];
        let nonce = [0x01u8; 12];
        let sealed = reference_seal(&key, &nonce, b"from another library", b"aad");

        let aead = ChaCha20Poly1305::new(&key).unwrap();
        assert_eq!(
            aead.open(&nonce, &sealed, b"aad").unwrap(),
            Some(b"from another library".to_vec())
        );
    }

    #[test]
    fn test_reference_opens_our_ciphertext() {
        let key = [0xa5u8; 32];
        let nonce = [0x02u8; 12];
        let sealed = ChaCha20Poly1305::new(&key)
            .unwrap()
            .seal(&nonce, b"to another library", b"")
            .unwrap();

        let reference = chacha20poly1305::ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&key));
        let opened = reference
            .decrypt(chacha20poly1305::Nonce::from_slice(&nonce), sealed.as_slice())
            .expect("reference decryption failed");
        assert_eq!(opened, b"to another library");
    }
}

mod stream_cipher_tests {
    use super::*;

    #[test]
    fn test_ciphers_produce_distinct_streams() {
        let key = [9u8; 32];
        let chacha = ChaCha20::new(&key, &[0u8; 12]).unwrap().encrypt(&[0u8; 64]);
        let xsalsa = XSalsa20::new(&key, &[0u8; 24]).unwrap().encrypt(&[0u8; 64]);
        assert_ne!(chacha, xsalsa);
    }

    #[test]
    fn test_large_message_roundtrip() {
        let (rng, _) = Csprng::with_defaults().unwrap();
        let key = rng.random_bytes(32).unwrap();
        let nonce = rng.random_bytes(24).unwrap();
        let message = rng.random_bytes(64 * 1024 + 7).unwrap();

        let cipher = XSalsa20::new(&key, &nonce).unwrap();
        assert_eq!(cipher.decrypt(&cipher.encrypt(&message)), message);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn blake2b_incremental_agrees(
        data in proptest::collection::vec(any::<u8>(), 0..600),
        split in 0usize..600,
        out_len in 1usize..=64,
    ) {
        let split = split.min(data.len());
        let mut hasher = Blake2b::new(out_len).unwrap();
        hasher.update(&data[..split]);
        hasher.update(&data[split..]);
        prop_assert_eq!(hasher.finalize(), blake2b(&data, out_len, None).unwrap());
    }

    #[test]
    fn poly1305_incremental_agrees(
        key in proptest::array::uniform32(any::<u8>()),
        data in proptest::collection::vec(any::<u8>(), 0..300),
        split in 0usize..300,
    ) {
        let split = split.min(data.len());
        let mut mac = Poly1305::new(&key).unwrap();
        mac.update(&data[..split]);
        mac.update(&data[split..]);
        prop_assert_eq!(mac.finish(), poly1305::auth(&data, &key).unwrap());
    }

    #[test]
    fn aead_rejects_any_single_bit_flip(
        plaintext in proptest::collection::vec(any::<u8>(), 1..128),
        bit in 0usize..1024,
    ) {
        let key = [0x33u8; 32];
        let nonce = [0x44u8; 12];
        let (mut ciphertext, tag) = aead::encrypt(&plaintext, &key, &nonce, &[]).unwrap();
        let bit = bit % (ciphertext.len() * 8);
        ciphertext[bit / 8] ^= 1 << (bit % 8);
        prop_assert_eq!(aead::decrypt(&ciphertext, &tag, &key, &nonce, &[]).unwrap(), None);
    }
}
