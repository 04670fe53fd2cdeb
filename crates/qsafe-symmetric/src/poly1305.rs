//! Poly1305 one-time authenticator (RFC 8439 §2.5)
//!
//! Arithmetic uses five 26-bit limbs. A key must never authenticate more
//! than one message.

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use qsafe_core::constants::{KEY_SIZE, TAG_SIZE};
use qsafe_core::{CryptoError, Result};

use crate::chacha20::le32;

const BLOCK: usize = 16;
const LIMB_MASK: u32 = 0x03ff_ffff;

/// Incremental Poly1305 state
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Poly1305 {
    r: [u32; 5],
    s: [u32; 4],
    pad: [u32; 4],
    h: [u32; 5],
    buf: [u8; BLOCK],
    buf_len: usize,
}

impl Poly1305 {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::key_length(KEY_SIZE, key.len()));
        }

        // r is clamped as part of limb extraction
        let r = [
            le32(&key[0..4]) & 0x03ff_ffff,
            (le32(&key[3..7]) >> 2) & 0x03ff_ff03,
            (le32(&key[6..10]) >> 4) & 0x03ff_c0ff,
            (le32(&key[9..13]) >> 6) & 0x03f0_3fff,
            (le32(&key[12..16]) >> 8) & 0x000f_ffff,
        ];
        let s = [r[1] * 5, r[2] * 5, r[3] * 5, r[4] * 5];
        let pad = [
            le32(&key[16..20]),
            le32(&key[20..24]),
            le32(&key[24..28]),
            le32(&key[28..32]),
        ];

        Ok(Self {
            r,
            s,
            pad,
            h: [0; 5],
            buf: [0; BLOCK],
            buf_len: 0,
        })
    }

    pub fn update(&mut self, mut data: &[u8]) {
        if self.buf_len > 0 {
            let take = (BLOCK - self.buf_len).min(data.len());
            self.buf[self.buf_len..self.buf_len + take].copy_from_slice(&data[..take]);
            self.buf_len += take;
            data = &data[take..];
            if self.buf_len < BLOCK {
                return;
            }
            let block = self.buf;
            self.block(&block, 1 << 24);
            self.buf_len = 0;
        }

        let mut chunks = data.chunks_exact(BLOCK);
        for chunk in &mut chunks {
            self.block(chunk, 1 << 24);
        }
        let rest = chunks.remainder();
        self.buf[..rest.len()].copy_from_slice(rest);
        self.buf_len = rest.len();
    }

    /// Produce the tag
    pub fn finish(mut self) -> [u8; TAG_SIZE] {
        if self.buf_len > 0 {
            let mut last = [0u8; BLOCK];
            last[..self.buf_len].copy_from_slice(&self.buf[..self.buf_len]);
            last[self.buf_len] = 1;
            self.block(&last, 0);
        }

        let [mut h0, mut h1, mut h2, mut h3, mut h4] = self.h;

        // full carry
        let mut c = h1 >> 26;
        h1 &= LIMB_MASK;
        h2 += c;
        c = h2 >> 26;
        h2 &= LIMB_MASK;
        h3 += c;
        c = h3 >> 26;
        h3 &= LIMB_MASK;
        h4 += c;
        c = h4 >> 26;
        h4 &= LIMB_MASK;
        h0 += c * 5;
        c = h0 >> 26;
        h0 &= LIMB_MASK;
        h1 += c;

        // g = h - p
        let mut g0 = h0.wrapping_add(5);
        c = g0 >> 26;
        g0 &= LIMB_MASK;
        let mut g1 = h1.wrapping_add(c);
        c = g1 >> 26;
        g1 &= LIMB_MASK;
        let mut g2 = h2.wrapping_add(c);
        c = g2 >> 26;
        g2 &= LIMB_MASK;
        let mut g3 = h3.wrapping_add(c);
        c = g3 >> 26;
        g3 &= LIMB_MASK;
        let g4 = h4.wrapping_add(c).wrapping_sub(1 << 26);

        // select h if h < p, else g, without branching
        let mask = (g4 >> 31).wrapping_sub(1);
        g0 &= mask;
        g1 &= mask;
        g2 &= mask;
        g3 &= mask;
        let g4 = g4 & mask;
        let keep = !mask;
        h0 = (h0 & keep) | g0;
        h1 = (h1 & keep) | g1;
        h2 = (h2 & keep) | g2;
        h3 = (h3 & keep) | g3;
        h4 = (h4 & keep) | g4;

        // h mod 2^128
        let w0 = h0 | (h1 << 26);
        let w1 = (h1 >> 6) | (h2 << 20);
        let w2 = (h2 >> 12) | (h3 << 14);
        let w3 = (h3 >> 18) | (h4 << 8);

        // tag = h + s
        let mut tag = [0u8; TAG_SIZE];
        let mut f = w0 as u64 + self.pad[0] as u64;
        tag[0..4].copy_from_slice(&(f as u32).to_le_bytes());
        f = w1 as u64 + self.pad[1] as u64 + (f >> 32);
        tag[4..8].copy_from_slice(&(f as u32).to_le_bytes());
        f = w2 as u64 + self.pad[2] as u64 + (f >> 32);
        tag[8..12].copy_from_slice(&(f as u32).to_le_bytes());
        f = w3 as u64 + self.pad[3] as u64 + (f >> 32);
        tag[12..16].copy_from_slice(&(f as u32).to_le_bytes());
        tag
    }

    fn block(&mut self, m: &[u8], hibit: u32) {
        let [r0, r1, r2, r3, r4] = self.r.map(u64::from);
        let [s1, s2, s3, s4] = self.s.map(u64::from);

        let h0 = (self.h[0] + (le32(&m[0..4]) & LIMB_MASK)) as u64;
        let h1 = (self.h[1] + ((le32(&m[3..7]) >> 2) & LIMB_MASK)) as u64;
        let h2 = (self.h[2] + ((le32(&m[6..10]) >> 4) & LIMB_MASK)) as u64;
        let h3 = (self.h[3] + ((le32(&m[9..13]) >> 6) & LIMB_MASK)) as u64;
        let h4 = (self.h[4] + ((le32(&m[12..16]) >> 8) | hibit)) as u64;

        let d0 = h0 * r0 + h1 * s4 + h2 * s3 + h3 * s2 + h4 * s1;
        let mut d1 = h0 * r1 + h1 * r0 + h2 * s4 + h3 * s3 + h4 * s2;
        let mut d2 = h0 * r2 + h1 * r1 + h2 * r0 + h3 * s4 + h4 * s3;
        let mut d3 = h0 * r3 + h1 * r2 + h2 * r1 + h3 * r0 + h4 * s4;
        let mut d4 = h0 * r4 + h1 * r3 + h2 * r2 + h3 * r1 + h4 * r0;

        let mask = LIMB_MASK as u64;
        let mut c = d0 >> 26;
        let mut n0 = (d0 & mask) as u32;
        d1 += c;
        c = d1 >> 26;
        let mut n1 = (d1 & mask) as u32;
        d2 += c;
        c = d2 >> 26;
        let n2 = (d2 & mask) as u32;
        d3 += c;
        c = d3 >> 26;
        let n3 = (d3 & mask) as u32;
        d4 += c;
        c = d4 >> 26;
        let n4 = (d4 & mask) as u32;
        n0 += (c * 5) as u32;
        let carry = n0 >> 26;
        n0 &= LIMB_MASK;
        n1 += carry;

        self.h = [n0, n1, n2, n3, n4];
    }
}

impl std::fmt::Debug for Poly1305 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poly1305").finish_non_exhaustive()
    }
}

/// One-shot tag of `data` under a one-time `key`
pub fn auth(data: &[u8], key: &[u8]) -> Result<[u8; TAG_SIZE]> {
    let mut mac = Poly1305::new(key)?;
    mac.update(data);
    Ok(mac.finish())
}

/// Constant-time tag comparison. Different lengths are unequal.
pub fn verify(tag_a: &[u8], tag_b: &[u8]) -> bool {
    tag_a.len() == tag_b.len() && bool::from(tag_a.ct_eq(tag_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_KEY: &str = "85d6be7857556d337f4452fe42d506a80103808afb0db2fd4abff6af4149f51b";
    const RFC_MSG: &[u8] = b"Cryptographic Forum Research Group";
    const RFC_TAG: &str = "a8061dc1305136c6c22b8baf0c0127a9";

    #[test]
    fn test_rfc8439_vector() {
        let key = hex::decode(RFC_KEY).unwrap();
        let tag = auth(RFC_MSG, &key).unwrap();
        assert_eq!(hex::encode(tag), RFC_TAG);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let key = hex::decode(RFC_KEY).unwrap();
        for split in 0..=RFC_MSG.len() {
            let mut mac = Poly1305::new(&key).unwrap();
            mac.update(&RFC_MSG[..split]);
            mac.update(&RFC_MSG[split..]);
            assert_eq!(hex::encode(mac.finish()), RFC_TAG, "split at {}", split);
        }

        let mut mac = Poly1305::new(&key).unwrap();
        for byte in RFC_MSG {
            mac.update(std::slice::from_ref(byte));
        }
        assert_eq!(hex::encode(mac.finish()), RFC_TAG);
    }

    #[test]
    fn test_empty_message_tag_is_s() {
        // With no blocks the accumulator stays zero and the tag is the pad
        let mut key = [0u8; 32];
        key[16..].copy_from_slice(&[0xabu8; 16]);
        assert_eq!(auth(&[], &key).unwrap(), [0xabu8; 16]);
    }

    #[test]
    fn test_wrong_key_length() {
        assert_eq!(
            Poly1305::new(&[0u8; 16]).unwrap_err(),
            CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 16
            }
        );
    }

    #[test]
    fn test_verify() {
        let a = [5u8; 16];
        let mut b = a;
        assert!(verify(&a, &b));

        b[15] ^= 1;
        assert!(!verify(&a, &b));
        b = a;
        b[0] ^= 1;
        assert!(!verify(&a, &b));

        assert!(!verify(&a, &a[..15]));
        assert!(verify(&[], &[]));
    }
}
