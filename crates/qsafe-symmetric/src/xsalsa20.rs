//! XSalsa20 stream cipher
//!
//! HSalsa20 derives a subkey from the key and the first 16 nonce bytes; the
//! remaining 8 nonce bytes drive a plain Salsa20/20 stream under that
//! subkey.

use zeroize::{Zeroize, ZeroizeOnDrop};

use qsafe_core::constants::{KEY_SIZE, XSALSA20_NONCE_SIZE};
use qsafe_core::{CryptoError, Result};

use crate::chacha20::le32;

const BLOCK_SIZE: usize = 64;
const SIGMA: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

/// XSalsa20 with a 24-byte nonce
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct XSalsa20 {
    subkey: [u32; 8],
    nonce: [u32; 2],
}

impl XSalsa20 {
    pub fn new(key: &[u8], nonce: &[u8]) -> Result<Self> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::key_length(KEY_SIZE, key.len()));
        }
        if nonce.len() != XSALSA20_NONCE_SIZE {
            return Err(CryptoError::nonce_length(XSALSA20_NONCE_SIZE, nonce.len()));
        }

        let subkey = hsalsa20(key, &nonce[..16]);
        Ok(Self {
            subkey,
            nonce: [le32(&nonce[16..20]), le32(&nonce[20..24])],
        })
    }

    fn block(&self, counter: u64) -> [u8; BLOCK_SIZE] {
        let mut input = initial_state(&self.subkey);
        input[6] = self.nonce[0];
        input[7] = self.nonce[1];
        input[8] = counter as u32;
        input[9] = (counter >> 32) as u32;

        let mut x = input;
        double_rounds(&mut x);

        let mut out = [0u8; BLOCK_SIZE];
        for (i, chunk) in out.chunks_exact_mut(4).enumerate() {
            chunk.copy_from_slice(&x[i].wrapping_add(input[i]).to_le_bytes());
        }
        x.zeroize();
        input.zeroize();
        out
    }

    /// XOR the keystream into `data` in place
    pub fn apply_keystream(&self, data: &mut [u8]) {
        for (counter, chunk) in data.chunks_mut(BLOCK_SIZE).enumerate() {
            let mut block = self.block(counter as u64);
            for (byte, key) in chunk.iter_mut().zip(block.iter()) {
                *byte ^= key;
            }
            block.zeroize();
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

impl std::fmt::Debug for XSalsa20 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XSalsa20").finish_non_exhaustive()
    }
}

/// HSalsa20: 20 rounds without the feed-forward, output words 0,5,10,15,6..9
fn hsalsa20(key: &[u8], nonce16: &[u8]) -> [u32; 8] {
    let mut key_words = [0u32; 8];
    for (word, chunk) in key_words.iter_mut().zip(key.chunks_exact(4)) {
        *word = le32(chunk);
    }

    let mut x = initial_state(&key_words);
    for (i, chunk) in nonce16.chunks_exact(4).enumerate() {
        x[6 + i] = le32(chunk);
    }
    double_rounds(&mut x);

    let out = [x[0], x[5], x[10], x[15], x[6], x[7], x[8], x[9]];
    x.zeroize();
    key_words.zeroize();
    out
}

fn initial_state(key: &[u32; 8]) -> [u32; 16] {
    let mut state = [0u32; 16];
    state[0] = SIGMA[0];
    state[5] = SIGMA[1];
    state[10] = SIGMA[2];
    state[15] = SIGMA[3];
    state[1..5].copy_from_slice(&key[..4]);
    state[11..15].copy_from_slice(&key[4..]);
    state
}

fn double_rounds(x: &mut [u32; 16]) {
    for _ in 0..10 {
        // columns
        quarter_round(x, 0, 4, 8, 12);
        quarter_round(x, 5, 9, 13, 1);
        quarter_round(x, 10, 14, 2, 6);
        quarter_round(x, 15, 3, 7, 11);
        // rows
        quarter_round(x, 0, 1, 2, 3);
        quarter_round(x, 5, 6, 7, 4);
        quarter_round(x, 10, 11, 8, 9);
        quarter_round(x, 15, 12, 13, 14);
    }
}

#[inline(always)]
fn quarter_round(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    x[b] ^= x[a].wrapping_add(x[d]).rotate_left(7);
    x[c] ^= x[b].wrapping_add(x[a]).rotate_left(9);
    x[d] ^= x[c].wrapping_add(x[b]).rotate_left(13);
    x[a] ^= x[d].wrapping_add(x[c]).rotate_left(18);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let key = [0x42u8; 32];
        let nonce = [0x24u8; 24];
        let cipher = XSalsa20::new(&key, &nonce).unwrap();

        let plaintext: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
        let ciphertext = cipher.encrypt(&plaintext);
        assert_ne!(ciphertext, plaintext);
        assert_eq!(cipher.decrypt(&ciphertext), plaintext);
    }

    #[test]
    fn test_every_nonce_byte_matters() {
        let key = [1u8; 32];
        let base = XSalsa20::new(&key, &[0u8; 24]).unwrap().encrypt(&[0u8; 32]);

        // First half feeds HSalsa20, second half feeds the stream
        for idx in [0, 15, 16, 23] {
            let mut nonce = [0u8; 24];
            nonce[idx] = 1;
            let other = XSalsa20::new(&key, &nonce).unwrap().encrypt(&[0u8; 32]);
            assert_ne!(base, other, "nonce byte {}", idx);
        }
    }

    #[test]
    fn test_streaming_is_prefix_consistent() {
        let cipher = XSalsa20::new(&[3u8; 32], &[5u8; 24]).unwrap();
        let long = cipher.encrypt(&[0u8; 200]);
        let short = cipher.encrypt(&[0u8; 70]);
        assert_eq!(&long[..70], &short[..]);
    }

    #[test]
    fn test_wrong_lengths() {
        assert!(matches!(
            XSalsa20::new(&[0u8; 31], &[0u8; 24]),
            Err(CryptoError::InvalidKeyLength { .. })
        ));
        assert!(matches!(
            XSalsa20::new(&[0u8; 32], &[0u8; 12]),
            Err(CryptoError::InvalidNonceLength {
                expected: 24,
                actual: 12
            })
        ));
    }

    #[test]
    fn test_empty_input() {
        let cipher = XSalsa20::new(&[0u8; 32], &[0u8; 24]).unwrap();
        assert!(cipher.encrypt(&[]).is_empty());
    }
}
