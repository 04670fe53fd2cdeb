//! ChaCha20 stream cipher (RFC 8439)
//!
//! 256-bit key, 96-bit nonce, 32-bit block counter. Encryption and
//! decryption are the same keystream XOR.

use zeroize::{Zeroize, ZeroizeOnDrop};

use qsafe_core::constants::{CHACHA20_NONCE_SIZE, KEY_SIZE};
use qsafe_core::{CryptoError, Result};

/// Keystream block size in bytes
pub const BLOCK_SIZE: usize = 64;

const CONSTANTS: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

/// ChaCha20 keyed with a key, nonce and initial block counter
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ChaCha20 {
    key: [u32; 8],
    nonce: [u32; 3],
    counter: u32,
}

impl ChaCha20 {
    /// Create a cipher starting at block counter 0
    pub fn new(key: &[u8], nonce: &[u8]) -> Result<Self> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::key_length(KEY_SIZE, key.len()));
        }
        if nonce.len() != CHACHA20_NONCE_SIZE {
            return Err(CryptoError::nonce_length(CHACHA20_NONCE_SIZE, nonce.len()));
        }

        let mut key_words = [0u32; 8];
        for (word, chunk) in key_words.iter_mut().zip(key.chunks_exact(4)) {
            *word = le32(chunk);
        }
        let mut nonce_words = [0u32; 3];
        for (word, chunk) in nonce_words.iter_mut().zip(nonce.chunks_exact(4)) {
            *word = le32(chunk);
        }

        Ok(Self {
            key: key_words,
            nonce: nonce_words,
            counter: 0,
        })
    }

    /// Start the keystream at `counter` instead of 0
    pub fn with_counter(mut self, counter: u32) -> Self {
        self.counter = counter;
        self
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// One 64-byte keystream block
    pub fn keystream_block(&self, counter: u32) -> [u8; BLOCK_SIZE] {
        let mut input = [0u32; 16];
        input[..4].copy_from_slice(&CONSTANTS);
        input[4..12].copy_from_slice(&self.key);
        input[12] = counter;
        input[13..].copy_from_slice(&self.nonce);

        let mut x = input;
        for _ in 0..10 {
            quarter_round(&mut x, 0, 4, 8, 12);
            quarter_round(&mut x, 1, 5, 9, 13);
            quarter_round(&mut x, 2, 6, 10, 14);
            quarter_round(&mut x, 3, 7, 11, 15);
            quarter_round(&mut x, 0, 5, 10, 15);
            quarter_round(&mut x, 1, 6, 11, 12);
            quarter_round(&mut x, 2, 7, 8, 13);
            quarter_round(&mut x, 3, 4, 9, 14);
        }

        let mut out = [0u8; BLOCK_SIZE];
        for (i, chunk) in out.chunks_exact_mut(4).enumerate() {
            chunk.copy_from_slice(&x[i].wrapping_add(input[i]).to_le_bytes());
        }
        x.zeroize();
        input.zeroize();
        out
    }

    /// XOR the keystream into `data` in place, starting at the initial counter
    pub fn apply_keystream(&self, data: &mut [u8]) {
        let mut counter = self.counter;
        for chunk in data.chunks_mut(BLOCK_SIZE) {
            let mut block = self.keystream_block(counter);
            for (byte, key) in chunk.iter_mut().zip(block.iter()) {
                *byte ^= key;
            }
            block.zeroize();
            counter = counter.wrapping_add(1);
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut out = plaintext.to_vec();
        self.apply_keystream(&mut out);
        out
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        self.encrypt(ciphertext)
    }
}

impl std::fmt::Debug for ChaCha20 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaCha20")
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

#[inline(always)]
fn quarter_round(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    x[a] = x[a].wrapping_add(x[b]);
    x[d] = (x[d] ^ x[a]).rotate_left(16);
    x[c] = x[c].wrapping_add(x[d]);
    x[b] = (x[b] ^ x[c]).rotate_left(12);
    x[a] = x[a].wrapping_add(x[b]);
    x[d] = (x[d] ^ x[a]).rotate_left(8);
    x[c] = x[c].wrapping_add(x[d]);
    x[b] = (x[b] ^ x[c]).rotate_left(7);
}

pub(crate) fn le32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc_key() -> Vec<u8> {
        (0u8..32).collect()
    }

    #[test]
    fn test_block_function_vector() {
        // RFC 8439 §2.3.2
        let nonce = hex::decode("000000090000004a00000000").unwrap();
        let cipher = ChaCha20::new(&rfc_key(), &nonce).unwrap();
        let block = cipher.keystream_block(1);
        assert_eq!(hex::encode(&block[..16]), "10f1e7e4d13b5915500fdd1fa32071c4");
    }

    #[test]
    fn test_encryption_vector() {
        // RFC 8439 §2.4.2
        let nonce = hex::decode("000000000000004a00000000").unwrap();
        let cipher = ChaCha20::new(&rfc_key(), &nonce).unwrap().with_counter(1);
        let plaintext = b"Ladies and Gentlemen of the class of '99: If I could offer you only one tip for the future, sunscreen would be it.";
        let ciphertext = cipher.encrypt(plaintext);

        assert_eq!(ciphertext.len(), plaintext.len());
        assert_eq!(hex::encode(&ciphertext[..16]), "6e2e359a2568f98041ba0728dd0d6981");
        assert_eq!(cipher.decrypt(&ciphertext), plaintext.to_vec());
    }

    #[test]
    fn test_wrong_lengths() {
        assert_eq!(
            ChaCha20::new(&[0u8; 16], &[0u8; 12]).unwrap_err(),
            CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 16
            }
        );
        assert_eq!(
            ChaCha20::new(&[0u8; 32], &[0u8; 8]).unwrap_err(),
            CryptoError::InvalidNonceLength {
                expected: 12,
                actual: 8
            }
        );
    }

    #[test]
    fn test_empty_input() {
        let cipher = ChaCha20::new(&[1u8; 32], &[2u8; 12]).unwrap();
        assert!(cipher.encrypt(&[]).is_empty());
    }

    #[test]
    fn test_counter_offsets_keystream() {
        let key = [7u8; 32];
        let nonce = [9u8; 12];
        let data = [0u8; 128];

        let from_zero = ChaCha20::new(&key, &nonce).unwrap().encrypt(&data);
        let from_one = ChaCha20::new(&key, &nonce)
            .unwrap()
            .with_counter(1)
            .encrypt(&data[..64]);
        assert_eq!(&from_zero[64..], &from_one[..]);
    }
}
