//! ChaCha20-Poly1305 AEAD (RFC 8439 §2.8)
//!
//! The one-time Poly1305 key is the first 32 bytes of ChaCha20 block 0 and
//! the payload is encrypted from block 1. The MAC covers
//! `aad ‖ pad16 ‖ ciphertext ‖ pad16 ‖ le64(|aad|) ‖ le64(|ciphertext|)`.
//!
//! Decryption checks the tag in constant time before any plaintext is
//! produced. Every authentication failure looks the same: `Ok(None)`.

use zeroize::{Zeroize, Zeroizing};

use qsafe_core::constants::{CHACHA20_NONCE_SIZE, KEY_SIZE, TAG_SIZE};
use qsafe_core::{CryptoError, Result};

use crate::chacha20::ChaCha20;
use crate::poly1305::{self, Poly1305};

/// Encrypt and authenticate, returning `(ciphertext, tag)`
pub fn encrypt(
    plaintext: &[u8],
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_SIZE])> {
    let cipher = ChaCha20::new(key, nonce)?;
    let ciphertext = cipher.clone().with_counter(1).encrypt(plaintext);
    let tag = compute_tag(&cipher, aad, &ciphertext)?;
    Ok((ciphertext, tag))
}

/// Verify and decrypt
///
/// Malformed key, nonce or tag lengths are errors, checked before any
/// cryptographic work. A tag mismatch from any cause is `Ok(None)`.
pub fn decrypt(
    ciphertext: &[u8],
    tag: &[u8],
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
) -> Result<Option<Vec<u8>>> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::key_length(KEY_SIZE, key.len()));
    }
    if nonce.len() != CHACHA20_NONCE_SIZE {
        return Err(CryptoError::nonce_length(CHACHA20_NONCE_SIZE, nonce.len()));
    }
    if tag.len() != TAG_SIZE {
        return Err(CryptoError::InvalidInput(format!(
            "tag must be {} bytes, got {}",
            TAG_SIZE,
            tag.len()
        )));
    }

    let cipher = ChaCha20::new(key, nonce)?;
    let expected = compute_tag(&cipher, aad, ciphertext)?;
    if !poly1305::verify(&expected, tag) {
        return Ok(None);
    }

    Ok(Some(cipher.with_counter(1).decrypt(ciphertext)))
}

fn compute_tag(cipher: &ChaCha20, aad: &[u8], ciphertext: &[u8]) -> Result<[u8; TAG_SIZE]> {
    let mut block0 = cipher.keystream_block(0);
    let mac_key = Zeroizing::new(block0[..KEY_SIZE].to_vec());
    block0.zeroize();

    let mut mac = Poly1305::new(&mac_key)?;
    mac.update(aad);
    mac.update(&padding(aad.len()));
    mac.update(ciphertext);
    mac.update(&padding(ciphertext.len()));
    mac.update(&(aad.len() as u64).to_le_bytes());
    mac.update(&(ciphertext.len() as u64).to_le_bytes());
    Ok(mac.finish())
}

fn padding(len: usize) -> Vec<u8> {
    vec![0u8; (16 - len % 16) % 16]
}

/// ChaCha20-Poly1305 bound to a key
///
/// `seal` output is `ciphertext ‖ tag`.
pub struct ChaCha20Poly1305 {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl ChaCha20Poly1305 {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::key_length(KEY_SIZE, key.len()));
        }
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        bytes.copy_from_slice(key);
        Ok(Self { key: bytes })
    }

    pub fn seal(&self, nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let (mut sealed, tag) = encrypt(plaintext, &self.key[..], nonce, aad)?;
        sealed.extend_from_slice(&tag);
        Ok(sealed)
    }

    /// Open `ciphertext ‖ tag`. Input shorter than a tag is an error.
    pub fn open(&self, nonce: &[u8], sealed: &[u8], aad: &[u8]) -> Result<Option<Vec<u8>>> {
        if sealed.len() < TAG_SIZE {
            return Err(CryptoError::InvalidInput(format!(
                "sealed message shorter than the {}-byte tag",
                TAG_SIZE
            )));
        }
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);
        decrypt(ciphertext, tag, &self.key[..], nonce, aad)
    }
}

impl std::fmt::Debug for ChaCha20Poly1305 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaCha20Poly1305").finish_non_exhaustive()
    }
}
