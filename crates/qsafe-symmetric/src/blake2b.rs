//! BLAKE2b (RFC 7693)
//!
//! Keyed and unkeyed hashing with digest lengths from 1 to 64 bytes. The
//! post-quantum suite uses the helpers at the bottom of this module for
//! domain-separated hashing and seed expansion.

use zeroize::{Zeroize, ZeroizeOnDrop};

use qsafe_core::constants::{BLAKE2B_MAX_KEY, BLAKE2B_MAX_OUTPUT};
use qsafe_core::{CryptoError, Result};

const BLOCK_BYTES: usize = 128;
const ROUNDS: usize = 12;

const IV: [u64; 8] = [
    0x6a09_e667_f3bc_c908,
    0xbb67_ae85_84ca_a73b,
    0x3c6e_f372_fe94_f82b,
    0xa54f_f53a_5f1d_36f1,
    0x510e_527f_ade6_82d1,
    0x9b05_688c_2b3e_6c1f,
    0x1f83_d9ab_fb41_bd6b,
    0x5be0_cd19_137e_2179,
];

const SIGMA: [[usize; 16]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
    [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
    [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
    [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
    [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
    [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
    [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
    [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
    [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
];

/// Incremental BLAKE2b hasher
///
/// The last block is held back until [`Blake2b::finalize`] so that it can
/// be compressed with the finalization flag set.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Blake2b {
    h: [u64; 8],
    t: u128,
    buf: [u8; BLOCK_BYTES],
    buf_len: usize,
    out_len: usize,
}

impl Blake2b {
    /// Unkeyed hasher producing `out_len` bytes
    pub fn new(out_len: usize) -> Result<Self> {
        Self::new_keyed(out_len, &[])
    }

    /// Keyed hasher (MAC mode). An empty key is the unkeyed hash.
    pub fn new_keyed(out_len: usize, key: &[u8]) -> Result<Self> {
        if out_len == 0 || out_len > BLAKE2B_MAX_OUTPUT {
            return Err(CryptoError::InvalidParameter(format!(
                "BLAKE2b output length must be 1..={}, got {}",
                BLAKE2B_MAX_OUTPUT, out_len
            )));
        }
        if key.len() > BLAKE2B_MAX_KEY {
            return Err(CryptoError::InvalidParameter(format!(
                "BLAKE2b key must be at most {} bytes, got {}",
                BLAKE2B_MAX_KEY,
                key.len()
            )));
        }

        let mut h = IV;
        h[0] ^= 0x0101_0000 ^ ((key.len() as u64) << 8) ^ out_len as u64;

        let mut hasher = Self {
            h,
            t: 0,
            buf: [0u8; BLOCK_BYTES],
            buf_len: 0,
            out_len,
        };

        if !key.is_empty() {
            hasher.buf[..key.len()].copy_from_slice(key);
            hasher.buf_len = BLOCK_BYTES;
        }
        Ok(hasher)
    }

    /// Digest length this hasher produces
    pub fn output_len(&self) -> usize {
        self.out_len
    }

    /// Absorb more input
    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            if self.buf_len == BLOCK_BYTES {
                self.t += BLOCK_BYTES as u128;
                self.compress(false);
                self.buf_len = 0;
            }
            let take = (BLOCK_BYTES - self.buf_len).min(data.len());
            self.buf[self.buf_len..self.buf_len + take].copy_from_slice(&data[..take]);
            self.buf_len += take;
            data = &data[take..];
        }
    }

    /// Finish and return the digest
    pub fn finalize(mut self) -> Vec<u8> {
        self.t += self.buf_len as u128;
        self.buf[self.buf_len..].fill(0);
        self.compress(true);

        let mut out = Vec::with_capacity(BLAKE2B_MAX_OUTPUT);
        for word in self.h.iter() {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.truncate(self.out_len);
        out
    }

    fn compress(&mut self, last: bool) {
        let mut m = [0u64; 16];
        for (word, chunk) in m.iter_mut().zip(self.buf.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *word = u64::from_le_bytes(bytes);
        }

        let mut v = [0u64; 16];
        v[..8].copy_from_slice(&self.h);
        v[8..].copy_from_slice(&IV);
        v[12] ^= self.t as u64;
        v[13] ^= (self.t >> 64) as u64;
        if last {
            v[14] = !v[14];
        }

        for round in 0..ROUNDS {
            let s = &SIGMA[round % 10];
            g(&mut v, 0, 4, 8, 12, m[s[0]], m[s[1]]);
            g(&mut v, 1, 5, 9, 13, m[s[2]], m[s[3]]);
            g(&mut v, 2, 6, 10, 14, m[s[4]], m[s[5]]);
            g(&mut v, 3, 7, 11, 15, m[s[6]], m[s[7]]);
            g(&mut v, 0, 5, 10, 15, m[s[8]], m[s[9]]);
            g(&mut v, 1, 6, 11, 12, m[s[10]], m[s[11]]);
            g(&mut v, 2, 7, 8, 13, m[s[12]], m[s[13]]);
            g(&mut v, 3, 4, 9, 14, m[s[14]], m[s[15]]);
        }

        for i in 0..8 {
            self.h[i] ^= v[i] ^ v[i + 8];
        }

        m.zeroize();
        v.zeroize();
    }
}

impl std::fmt::Debug for Blake2b {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blake2b")
            .field("out_len", &self.out_len)
            .finish_non_exhaustive()
    }
}

#[inline(always)]
fn g(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize, x: u64, y: u64) {
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(x);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(y);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

/// One-shot BLAKE2b
pub fn blake2b(data: &[u8], out_len: usize, key: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut hasher = Blake2b::new_keyed(out_len, key.unwrap_or(&[]))?;
    hasher.update(data);
    Ok(hasher.finalize())
}

/// Hash the concatenation of `parts` to 32 bytes
pub fn blake2b_256(parts: &[&[u8]]) -> [u8; 32] {
    hash_parts::<32>(parts)
}

/// Hash the concatenation of `parts` to 64 bytes
pub fn blake2b_512(parts: &[&[u8]]) -> [u8; 64] {
    hash_parts::<64>(parts)
}

fn hash_parts<const N: usize>(parts: &[&[u8]]) -> [u8; N] {
    let mut h = IV;
    h[0] ^= 0x0101_0000 ^ N as u64;
    let mut hasher = Blake2b {
        h,
        t: 0,
        buf: [0u8; BLOCK_BYTES],
        buf_len: 0,
        out_len: N,
    };
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; N];
    out.copy_from_slice(&digest);
    out
}

/// Expand `seed` into `out_len` bytes under a domain label
///
/// Block `i` is `BLAKE2b-512(domain ‖ le32(i) ‖ seed)`.
pub fn expand(seed: &[u8], domain: &[u8], out_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(out_len + BLAKE2B_MAX_OUTPUT);
    let mut counter = 0u32;
    while out.len() < out_len {
        out.extend_from_slice(&blake2b_512(&[domain, &counter.to_le_bytes(), seed]));
        counter = counter.wrapping_add(1);
    }
    out.truncate(out_len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake2b_512_empty() {
        let digest = blake2b(b"", 64, None).unwrap();
        assert_eq!(
            hex::encode(digest),
            "786a02f742015903c6c6fd852552d272912f4740e15847618a86e217f71f5419\
             d25e1031afee585313896444934eb04b903a685b1448b755d56f701afe9be2ce"
        );
    }

    #[test]
    fn test_blake2b_512_abc() {
        let digest = blake2b(b"abc", 64, None).unwrap();
        assert_eq!(
            hex::encode(digest),
            "ba80a53f981c4d0d6a2797b69f12f6e94c212f14685ac4b74b12bb6fdbffa2d1\
             7d87c5392aab792dc252d5de4533cc9518d38aa8dbf1925ab92386edd4009923"
        );
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            Blake2b::new(0),
            Err(CryptoError::InvalidParameter(_))
        ));
        assert!(Blake2b::new(65).is_err());
        assert!(Blake2b::new_keyed(32, &[0u8; 65]).is_err());
        assert!(Blake2b::new_keyed(32, &[0u8; 64]).is_ok());
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let expected = blake2b(&data, 48, Some(b"secret key")).unwrap();

        for split in [0, 1, 127, 128, 129, 256, 999, 1000] {
            let mut hasher = Blake2b::new_keyed(48, b"secret key").unwrap();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            assert_eq!(hasher.finalize(), expected, "split at {}", split);
        }
    }

    #[test]
    fn test_block_boundary_inputs_differ() {
        let a = blake2b(&[0u8; 128], 32, None).unwrap();
        let b = blake2b(&[0u8; 129], 32, None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_output_length_and_key_separation() {
        assert_eq!(blake2b(b"x", 1, None).unwrap().len(), 1);
        let unkeyed = blake2b(b"msg", 32, None).unwrap();
        let keyed = blake2b(b"msg", 32, Some(b"k")).unwrap();
        assert_ne!(unkeyed, keyed);
        // Digest length is a parameter, not a truncation
        assert_ne!(&blake2b(b"msg", 64, None).unwrap()[..32], &unkeyed[..]);
    }

    #[test]
    fn test_parts_helpers() {
        assert_eq!(
            blake2b_256(&[b"ab", b"c"]).to_vec(),
            blake2b(b"abc", 32, None).unwrap()
        );
        assert_eq!(
            blake2b_512(&[b"a", b"", b"bc"]).to_vec(),
            blake2b(b"abc", 64, None).unwrap()
        );
    }

    #[test]
    fn test_expand() {
        let a = expand(b"seed", b"domain-a", 200);
        let b = expand(b"seed", b"domain-b", 200);
        assert_eq!(a.len(), 200);
        assert_ne!(a, b);
        assert_eq!(&expand(b"seed", b"domain-a", 10)[..], &a[..10]);
        assert!(expand(b"seed", b"d", 0).is_empty());
    }
}
