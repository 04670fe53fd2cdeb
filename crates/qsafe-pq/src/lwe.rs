//! Learning-With-Errors public-key encryption
//!
//! Bit-at-a-time Regev encryption over `Z_q` with `q` a power of two, so
//! every reduction is a mask. A public key is a uniform matrix `A` and
//! `b = A·s + e`; the private key is the binary vector `s`.
//!
//! Decoding compares `m' = c2 - sᵗ·c1` against the two candidates `0` and
//! `q/2`. A value further than `reject_margin` from both is a decode
//! failure: fatal for [`LweCrypto::decrypt_bit`], tolerated up to 5% of the
//! bits by [`LweCrypto::decrypt`] (the bit defaults to the nearest
//! candidate).

use std::f64::consts::PI;

use zeroize::{Zeroize, ZeroizeOnDrop};

use qsafe_core::constants::LWE_MAX_DECODE_FAILURE_RATE;
use qsafe_core::{CryptoError, LweConfig, Result};
use qsafe_random::Csprng;

/// Default lattice dimension
pub const DEFAULT_N: usize = 256;

/// Default modulus
pub const DEFAULT_Q: u32 = 4096;

/// Default Gaussian width
pub const DEFAULT_SIGMA: f64 = 3.2;

const HEADER_SIZE: usize = 4;

// ============================================================================
// Parameters
// ============================================================================

/// LWE parameter set, fixed for the lifetime of an [`LweCrypto`]
#[derive(Clone, Debug, PartialEq)]
pub struct LweParams {
    /// Lattice dimension
    pub n: usize,
    /// Modulus, a power of two
    pub q: u32,
    /// Gaussian noise width
    pub sigma: f64,
    /// Largest accepted distance from a decoding candidate
    pub reject_margin: u32,
}

impl LweParams {
    /// Parameters for dimension `n` with default modulus, noise and margin
    pub fn new(n: usize) -> Result<Self> {
        let params = Self {
            n,
            q: DEFAULT_Q,
            sigma: DEFAULT_SIGMA,
            reject_margin: default_margin(DEFAULT_Q),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn from_config(config: &LweConfig) -> Result<Self> {
        config.validate()?;
        let params = Self {
            n: config.n,
            q: config.q,
            sigma: config.sigma,
            reject_margin: config.reject_margin.unwrap_or_else(|| default_margin(config.q)),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        LweConfig {
            n: self.n,
            q: self.q,
            sigma: self.sigma,
            reject_margin: Some(self.reject_margin),
        }
        .validate()
    }

    /// `⌊q/2⌋`, the encoding of bit 1
    pub fn half_q(&self) -> u32 {
        self.q / 2
    }

    fn mask(&self) -> u32 {
        self.q - 1
    }

    pub fn public_key_size(&self) -> usize {
        (self.n * self.n + self.n) * 4
    }

    pub fn private_key_size(&self) -> usize {
        self.n * 4
    }

    /// Serialized size of one bit ciphertext
    pub fn bit_ciphertext_size(&self) -> usize {
        (self.n + 1) * 4
    }

    /// Serialized ciphertext size for a plaintext of `plaintext_len` bytes
    pub fn ciphertext_size(&self, plaintext_len: usize) -> usize {
        HEADER_SIZE + plaintext_len * 8 * self.bit_ciphertext_size()
    }
}

impl Default for LweParams {
    fn default() -> Self {
        Self {
            n: DEFAULT_N,
            q: DEFAULT_Q,
            sigma: DEFAULT_SIGMA,
            reject_margin: default_margin(DEFAULT_Q),
        }
    }
}

fn default_margin(q: u32) -> u32 {
    3 * q / 16
}

// ============================================================================
// Keys and ciphertexts
// ============================================================================

/// Public key `(A, b)`; `A` is stored row-major
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LwePublicKey {
    n: usize,
    a: Vec<u32>,
    b: Vec<u32>,
}

impl LwePublicKey {
    pub fn dimension(&self) -> usize {
        self.n
    }

    /// `A` words (n², row-major) followed by `b` words, u32 little-endian
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((self.a.len() + self.b.len()) * 4);
        for word in self.a.iter().chain(self.b.iter()) {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8], params: &LweParams) -> Result<Self> {
        let expected = params.public_key_size();
        if bytes.len() != expected {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "LWE public key must be {} bytes for n = {}, got {}",
                expected,
                params.n,
                bytes.len()
            )));
        }

        let words = read_words(bytes, params.q, "public key")?;
        let split = params.n * params.n;
        Ok(Self {
            n: params.n,
            a: words[..split].to_vec(),
            b: words[split..].to_vec(),
        })
    }
}

/// Private key `s`, a binary vector. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LwePrivateKey {
    s: Vec<u32>,
}

impl LwePrivateKey {
    pub fn dimension(&self) -> usize {
        self.s.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.s.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    pub fn from_bytes(bytes: &[u8], params: &LweParams) -> Result<Self> {
        let expected = params.private_key_size();
        if bytes.len() != expected {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "LWE private key must be {} bytes for n = {}, got {}",
                expected,
                params.n,
                bytes.len()
            )));
        }
        let s = read_words(bytes, 2, "private key")?;
        Ok(Self { s })
    }
}

impl std::fmt::Debug for LwePrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LwePrivateKey")
            .field("n", &self.s.len())
            .finish_non_exhaustive()
    }
}

/// Generated key pair
#[derive(Clone, Debug)]
pub struct LweKeyPair {
    pub public: LwePublicKey,
    pub private: LwePrivateKey,
}

/// Ciphertext of a single bit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitCiphertext {
    pub c1: Vec<u32>,
    pub c2: u32,
}

fn read_words(bytes: &[u8], bound: u32, what: &str) -> Result<Vec<u32>> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if word < bound {
                Ok(word)
            } else {
                Err(CryptoError::InvalidKeyFormat(format!(
                    "{} word {} out of range",
                    what, word
                )))
            }
        })
        .collect()
}

// ============================================================================
// LWE Crypto
// ============================================================================

/// LWE encryption engine bound to one parameter set
#[derive(Clone, Debug)]
pub struct LweCrypto {
    params: LweParams,
}

impl LweCrypto {
    pub fn new(params: LweParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &LweParams {
        &self.params
    }

    /// Sample `A`, `s`, `e` and publish `b = A·s + e`
    pub fn generate_key_pair(&self, rng: &Csprng) -> Result<LweKeyPair> {
        let n = self.params.n;
        let mask = self.params.mask();

        let a = sample_uniform(rng, n * n, mask)?;
        let s = sample_binary(rng, n)?;
        let e = sample_gaussian(rng, n, self.params.sigma, mask)?;

        let b = (0..n)
            .map(|i| {
                let row = &a[i * n..(i + 1) * n];
                let dot = row
                    .iter()
                    .zip(s.iter())
                    .fold(0u32, |acc, (&x, &y)| acc.wrapping_add(x.wrapping_mul(y)));
                dot.wrapping_add(e[i]) & mask
            })
            .collect();

        tracing::debug!(n, q = self.params.q, sigma = self.params.sigma, "generated LWE key pair");

        Ok(LweKeyPair {
            public: LwePublicKey { n, a, b },
            private: LwePrivateKey { s },
        })
    }

    /// `c1 = Aᵗ·r + e1`, `c2 = bᵗ·r + e2 + bit·⌊q/2⌋`
    pub fn encrypt_bit(&self, bit: bool, public_key: &LwePublicKey, rng: &Csprng) -> Result<BitCiphertext> {
        self.check_public(public_key)?;
        let n = self.params.n;
        let mask = self.params.mask();

        let r = sample_binary(rng, n)?;
        let noise = sample_gaussian(rng, n + 1, self.params.sigma, mask)?;

        let mut c1 = noise[..n].to_vec();
        for (i, &ri) in r.iter().enumerate() {
            if ri == 0 {
                continue;
            }
            let row = &public_key.a[i * n..(i + 1) * n];
            for (acc, &x) in c1.iter_mut().zip(row.iter()) {
                *acc = acc.wrapping_add(x);
            }
        }
        for word in c1.iter_mut() {
            *word &= mask;
        }

        let c2 = public_key
            .b
            .iter()
            .zip(r.iter())
            .fold(noise[n], |acc, (&bi, &ri)| acc.wrapping_add(bi.wrapping_mul(ri)))
            .wrapping_add(if bit { self.params.half_q() } else { 0 })
            & mask;

        Ok(BitCiphertext { c1, c2 })
    }

    /// Decode one bit; a value outside the margin of both candidates fails
    pub fn decrypt_bit(&self, ciphertext: &BitCiphertext, private_key: &LwePrivateKey) -> Result<bool> {
        self.check_private(private_key)?;
        if ciphertext.c1.len() != self.params.n {
            return Err(CryptoError::InvalidInput(format!(
                "bit ciphertext must carry {} words, got {}",
                self.params.n,
                ciphertext.c1.len()
            )));
        }

        let (bit, in_margin) = self.decode(&ciphertext.c1, ciphertext.c2, private_key);
        if in_margin {
            Ok(bit)
        } else {
            Err(CryptoError::DecryptionFailed(
                "value outside both decoding regions".to_string(),
            ))
        }
    }

    /// Encrypt a byte string, most significant bit first, behind a
    /// 4-byte little-endian length header
    pub fn encrypt(&self, plaintext: &[u8], public_key: &LwePublicKey, rng: &Csprng) -> Result<Vec<u8>> {
        self.check_public(public_key)?;
        let len = u32::try_from(plaintext.len())
            .map_err(|_| CryptoError::InvalidInput("plaintext too long".to_string()))?;

        let mut out = Vec::with_capacity(self.params.ciphertext_size(plaintext.len()));
        out.extend_from_slice(&len.to_le_bytes());

        for &byte in plaintext {
            for shift in (0..8).rev() {
                let ct = self.encrypt_bit((byte >> shift) & 1 == 1, public_key, rng)?;
                for word in ct.c1.iter() {
                    out.extend_from_slice(&word.to_le_bytes());
                }
                out.extend_from_slice(&ct.c2.to_le_bytes());
            }
        }
        Ok(out)
    }

    pub fn decrypt(&self, ciphertext: &[u8], private_key: &LwePrivateKey) -> Result<Vec<u8>> {
        self.check_private(private_key)?;
        if ciphertext.len() < HEADER_SIZE {
            return Err(CryptoError::InvalidInput(format!(
                "ciphertext shorter than the {}-byte header",
                HEADER_SIZE
            )));
        }

        let len = u32::from_le_bytes([ciphertext[0], ciphertext[1], ciphertext[2], ciphertext[3]]) as usize;
        let bit_size = self.params.bit_ciphertext_size();
        let expected = len
            .checked_mul(8 * bit_size)
            .and_then(|body| body.checked_add(HEADER_SIZE));
        if expected != Some(ciphertext.len()) {
            return Err(CryptoError::InvalidInput(format!(
                "ciphertext body does not match header length {}",
                len
            )));
        }

        let n = self.params.n;
        let total_bits = len * 8;
        let mut failures = 0usize;
        let mut out = Vec::with_capacity(len);
        let mut c1 = vec![0u32; n];

        for (index, chunk) in ciphertext[HEADER_SIZE..].chunks_exact(bit_size).enumerate() {
            for (word, bytes) in c1.iter_mut().zip(chunk.chunks_exact(4)) {
                *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
            let tail = &chunk[n * 4..];
            let c2 = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);

            let (bit, in_margin) = self.decode(&c1, c2, private_key);
            if !in_margin {
                failures += 1;
                if failures as f64 > total_bits as f64 * LWE_MAX_DECODE_FAILURE_RATE {
                    tracing::debug!(failures, total_bits, "LWE decode failure budget exceeded");
                    return Err(CryptoError::DecryptionFailed(
                        "too many undecodable bits".to_string(),
                    ));
                }
            }

            if index % 8 == 0 {
                out.push(0u8);
            }
            if bit {
                if let Some(last) = out.last_mut() {
                    *last |= 1 << (7 - index % 8);
                }
            }
        }

        if failures > 0 {
            tracing::debug!(failures, total_bits, "LWE decode failures within budget");
        }
        Ok(out)
    }

    /// `(nearest candidate, within margin)`
    fn decode(&self, c1: &[u32], c2: u32, private_key: &LwePrivateKey) -> (bool, bool) {
        let mask = self.params.mask();
        let inner = c1
            .iter()
            .zip(private_key.s.iter())
            .fold(0u32, |acc, (&c, &s)| acc.wrapping_add(c.wrapping_mul(s)));
        let m = c2.wrapping_sub(inner) & mask;

        let to_zero = m.min(self.params.q - m);
        let to_half = m.abs_diff(self.params.half_q());
        let bit = to_half < to_zero;
        let distance = to_zero.min(to_half);
        (bit, distance <= self.params.reject_margin)
    }

    fn check_public(&self, key: &LwePublicKey) -> Result<()> {
        if key.n != self.params.n || key.b.len() != self.params.n || key.a.len() != self.params.n * self.params.n {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "public key dimension {} does not match n = {}",
                key.n, self.params.n
            )));
        }
        Ok(())
    }

    fn check_private(&self, key: &LwePrivateKey) -> Result<()> {
        if key.s.len() != self.params.n {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "private key dimension {} does not match n = {}",
                key.s.len(),
                self.params.n
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Sampling
// ============================================================================

fn sample_uniform(rng: &Csprng, count: usize, mask: u32) -> Result<Vec<u32>> {
    let bytes = rng.random_bytes(count * 4)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) & mask)
        .collect())
}

fn sample_binary(rng: &Csprng, count: usize) -> Result<Vec<u32>> {
    let bytes = rng.random_bytes(count)?;
    Ok(bytes.iter().map(|b| (b & 1) as u32).collect())
}

/// Rounded Box–Muller samples reduced into `[0, q)`
fn sample_gaussian(rng: &Csprng, count: usize, sigma: f64, mask: u32) -> Result<Vec<u32>> {
    let bytes = rng.random_bytes(count * 8)?;
    Ok(bytes
        .chunks_exact(8)
        .map(|c| {
            let u1 = unit_open(u32::from_le_bytes([c[0], c[1], c[2], c[3]]));
            let u2 = unit_open(u32::from_le_bytes([c[4], c[5], c[6], c[7]]));
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
            let value = (z * sigma).round() as i32;
            value as u32 & mask
        })
        .collect())
}

/// Map a word into the open interval (0, 1)
fn unit_open(word: u32) -> f64 {
    (word as f64 + 1.0) / (u32::MAX as f64 + 2.0)
}
