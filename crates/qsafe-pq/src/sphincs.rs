//! SPHINCS+-style hash-based signatures
//!
//! A single WOTS+ key with checksum digits. Every chain step is a BLAKE2b
//! call tagged with the public seed and the `(chain, step)` address, and the
//! public root commits to the public seed, the tree height tag and all chain
//! tops.
//!
//! Layouts (n = hash bytes, len = len1 + len2 chains):
//! - public key: `root ‖ pub_seed` (2n)
//! - private key: `master_seed ‖ pub_seed` (2n)
//! - signature: `rand ‖ chain_0 ‖ … ‖ chain_{len-1}` (n·(1 + len))

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use qsafe_core::{CryptoError, Result, SphincsConfig};
use qsafe_random::Csprng;
use qsafe_symmetric::blake2b::blake2b_512;

const DOMAIN_SK_SEED: &[u8] = b"qsafe/sphincs/sk-seed";
const DOMAIN_PUB_SEED: &[u8] = b"qsafe/sphincs/pub-seed";
const DOMAIN_CHAIN_KEY: &[u8] = b"qsafe/sphincs/chain-key";
const DOMAIN_CHAIN: &[u8] = b"qsafe/sphincs/chain";
const DOMAIN_ROOT: &[u8] = b"qsafe/sphincs/root";
const DOMAIN_RAND: &[u8] = b"qsafe/sphincs/rand";
const DOMAIN_DIGEST: &[u8] = b"qsafe/sphincs/digest";

/// Parameter set `{n, w, h}`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SphincsParams {
    /// Hash output bytes
    pub n: usize,
    /// Winternitz base
    pub w: u32,
    /// Tree height
    pub h: u32,
}

impl Default for SphincsParams {
    fn default() -> Self {
        Self { n: 32, w: 16, h: 8 }
    }
}

impl SphincsParams {
    pub fn new(n: usize, w: u32, h: u32) -> Result<Self> {
        let params = Self { n, w, h };
        params.validate()?;
        Ok(params)
    }

    pub fn from_config(config: &SphincsConfig) -> Result<Self> {
        Self::new(config.n, config.w, config.h)
    }

    pub fn validate(&self) -> Result<()> {
        SphincsConfig {
            n: self.n,
            w: self.w,
            h: self.h,
        }
        .validate()
    }

    fn log_w(&self) -> usize {
        self.w.trailing_zeros() as usize
    }

    /// Message digits
    pub fn len1(&self) -> usize {
        (8 * self.n).div_ceil(self.log_w())
    }

    /// Checksum digits
    pub fn len2(&self) -> usize {
        let max_checksum = (self.len1() as u32) * (self.w - 1);
        let bits = (31 - max_checksum.leading_zeros()) as usize;
        bits / self.log_w() + 1
    }

    /// Total WOTS+ chains
    pub fn chains(&self) -> usize {
        self.len1() + self.len2()
    }

    pub fn public_key_size(&self) -> usize {
        2 * self.n
    }

    pub fn private_key_size(&self) -> usize {
        2 * self.n
    }

    pub fn signature_size(&self) -> usize {
        self.n * (1 + self.chains())
    }
}

/// Key pair as raw bytes; the private half is zeroized on drop
#[derive(Clone)]
pub struct SphincsKeyPair {
    pub public_key: Vec<u8>,
    pub private_key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for SphincsKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SphincsKeyPair")
            .field("public_key_len", &self.public_key.len())
            .finish_non_exhaustive()
    }
}

/// Signature bytes `rand ‖ chain outputs`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SphincsSignature(Vec<u8>);

impl SphincsSignature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for SphincsSignature {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for SphincsSignature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// SPHINCS+ signer/verifier for one parameter set
#[derive(Clone, Debug)]
pub struct SphincsPlus {
    params: SphincsParams,
}

impl SphincsPlus {
    pub fn new(params: SphincsParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SphincsParams {
        &self.params
    }

    pub fn generate_key_pair(&self, rng: &Csprng) -> Result<SphincsKeyPair> {
        let seed = Zeroizing::new(rng.random_bytes(self.params.n)?);
        self.generate_key_pair_from_seed(&seed)
    }

    /// Deterministic key generation; `seed` must be exactly n bytes
    pub fn generate_key_pair_from_seed(&self, seed: &[u8]) -> Result<SphincsKeyPair> {
        let n = self.params.n;
        if seed.len() != n {
            return Err(CryptoError::InvalidParameter(format!(
                "SPHINCS+ seed must be {} bytes, got {}",
                n,
                seed.len()
            )));
        }

        let sk_seed = Zeroizing::new(self.hash(&[DOMAIN_SK_SEED, seed]));
        let pub_seed = self.hash(&[DOMAIN_PUB_SEED, seed]);

        let w_max = self.params.w - 1;
        let mut tops = Vec::with_capacity(self.params.chains());
        for chain in 0..self.params.chains() {
            let start = Zeroizing::new(self.chain_key(&sk_seed, chain));
            tops.push(self.chain(&start, chain, 0, w_max, &pub_seed));
        }
        let root = self.root(&pub_seed, &tops);

        let mut public_key = Vec::with_capacity(2 * n);
        public_key.extend_from_slice(&root);
        public_key.extend_from_slice(&pub_seed);

        let mut private_key = Zeroizing::new(Vec::with_capacity(2 * n));
        private_key.extend_from_slice(seed);
        private_key.extend_from_slice(&pub_seed);

        tracing::debug!(n, w = self.params.w, chains = tops.len(), "generated SPHINCS+ key pair");
        Ok(SphincsKeyPair {
            public_key,
            private_key,
        })
    }

    pub fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<SphincsSignature> {
        let n = self.params.n;
        if private_key.len() != self.params.private_key_size() {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "SPHINCS+ private key must be {} bytes, got {}",
                self.params.private_key_size(),
                private_key.len()
            )));
        }
        let (master, pub_seed) = private_key.split_at(n);
        let sk_seed = Zeroizing::new(self.hash(&[DOMAIN_SK_SEED, master]));

        let randomness = self.hash(&[DOMAIN_RAND, master, message]);
        let digits = self.digits(&randomness, message);

        let mut signature = Vec::with_capacity(self.params.signature_size());
        signature.extend_from_slice(&randomness);
        for (chain, &digit) in digits.iter().enumerate() {
            let start = Zeroizing::new(self.chain_key(&sk_seed, chain));
            signature.extend_from_slice(&self.chain(&start, chain, 0, digit, pub_seed));
        }
        Ok(SphincsSignature(signature))
    }

    /// Check a signature. Malformed input is simply invalid.
    pub fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        let n = self.params.n;
        if public_key.len() != self.params.public_key_size()
            || signature.len() != self.params.signature_size()
        {
            return false;
        }

        let (root, pub_seed) = public_key.split_at(n);
        let (randomness, chains) = signature.split_at(n);
        let digits = self.digits(randomness, message);
        let w_max = self.params.w - 1;

        let tops: Vec<Vec<u8>> = chains
            .chunks_exact(n)
            .zip(digits.iter())
            .enumerate()
            .map(|(chain, (value, &digit))| self.chain(value, chain, digit, w_max - digit, pub_seed))
            .collect();

        let candidate = self.root(pub_seed, &tops);
        bool::from(candidate.as_slice().ct_eq(root))
    }

    fn hash(&self, parts: &[&[u8]]) -> Vec<u8> {
        let mut digest = blake2b_512(parts);
        let out = digest[..self.params.n].to_vec();
        digest.zeroize();
        out
    }

    fn chain_key(&self, sk_seed: &[u8], chain: usize) -> Vec<u8> {
        self.hash(&[DOMAIN_CHAIN_KEY, sk_seed, &(chain as u32).to_le_bytes()])
    }

    /// Apply `steps` chain iterations starting at position `start`
    fn chain(&self, value: &[u8], chain: usize, start: u32, steps: u32, pub_seed: &[u8]) -> Vec<u8> {
        let mut x = value.to_vec();
        let chain_tag = (chain as u32).to_le_bytes();
        for step in start..start + steps {
            let next = self.hash(&[DOMAIN_CHAIN, pub_seed, &chain_tag, &step.to_le_bytes(), &x]);
            x.zeroize();
            x = next;
        }
        x
    }

    fn root(&self, pub_seed: &[u8], tops: &[Vec<u8>]) -> Vec<u8> {
        let height = self.params.h.to_le_bytes();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(tops.len() + 3);
        parts.push(DOMAIN_ROOT);
        parts.push(pub_seed);
        parts.push(&height);
        parts.extend(tops.iter().map(|t| t.as_slice()));
        self.hash(&parts)
    }

    /// Message digits followed by checksum digits, all in `[0, w)`
    fn digits(&self, randomness: &[u8], message: &[u8]) -> Vec<u32> {
        let digest = self.hash(&[DOMAIN_DIGEST, randomness, message]);
        let log_w = self.params.log_w();
        let w_max = self.params.w - 1;

        let mut digits = base_w(&digest, log_w, self.params.len1());

        let checksum: u32 = digits.iter().map(|d| w_max - d).sum();
        let len2 = self.params.len2();
        let checksum_bits = len2 * log_w;
        let checksum_bytes = checksum_bits.div_ceil(8);
        let shifted = (checksum as u64) << (checksum_bytes * 8 - checksum_bits);
        let encoded = &shifted.to_be_bytes()[8 - checksum_bytes..];
        digits.extend(base_w(encoded, log_w, len2));
        digits
    }
}

/// Split `bytes` into `count` big-endian digits of `log_w` bits
fn base_w(bytes: &[u8], log_w: usize, count: usize) -> Vec<u32> {
    let mask = (1u32 << log_w) - 1;
    let mut digits = Vec::with_capacity(count);
    let mut acc = 0u32;
    let mut bits = 0usize;
    let mut input = bytes.iter();

    while digits.len() < count {
        if bits < log_w {
            acc = (acc << 8) | *input.next().unwrap_or(&0) as u32;
            bits += 8;
        }
        bits -= log_w;
        digits.push((acc >> bits) & mask);
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> Csprng {
        Csprng::with_defaults().unwrap().0
    }

    #[test]
    fn test_parameter_derivation() {
        let p = SphincsParams::default();
        assert_eq!(p.len1(), 64);
        assert_eq!(p.len2(), 3);
        assert_eq!(p.signature_size(), 32 * 68);

        let p4 = SphincsParams::new(32, 4, 8).unwrap();
        assert_eq!(p4.len1(), 128);
        assert_eq!(p4.len2(), 5);

        let p256 = SphincsParams::new(16, 256, 4).unwrap();
        assert_eq!(p256.len1(), 16);
        assert_eq!(p256.len2(), 2);

        assert!(SphincsParams::new(32, 8, 8).is_err());
        assert!(SphincsParams::new(8, 16, 8).is_err());
    }

    #[test]
    fn test_base_w() {
        assert_eq!(base_w(&[0x12, 0x34], 4, 4), vec![1, 2, 3, 4]);
        assert_eq!(base_w(&[0b1110_0100], 2, 4), vec![3, 2, 1, 0]);
        assert_eq!(base_w(&[0xab, 0xcd], 8, 2), vec![0xab, 0xcd]);
    }

    #[test]
    fn test_sign_and_verify() {
        let rng = rng();
        let sphincs = SphincsPlus::new(SphincsParams::default()).unwrap();
        let keys = sphincs.generate_key_pair(&rng).unwrap();
        assert_eq!(keys.public_key.len(), 64);
        assert_eq!(keys.private_key.len(), 64);

        let signature = sphincs.sign(b"hello sphincs", &keys.private_key).unwrap();
        assert_eq!(signature.len(), sphincs.params().signature_size());
        assert!(sphincs.verify(b"hello sphincs", signature.as_bytes(), &keys.public_key));
        assert!(!sphincs.verify(b"hello sphincz", signature.as_bytes(), &keys.public_key));
    }

    #[test]
    fn test_deterministic_from_seed() {
        let sphincs = SphincsPlus::new(SphincsParams::default()).unwrap();
        let a = sphincs.generate_key_pair_from_seed(&[7u8; 32]).unwrap();
        let b = sphincs.generate_key_pair_from_seed(&[7u8; 32]).unwrap();
        let c = sphincs.generate_key_pair_from_seed(&[8u8; 32]).unwrap();

        assert_eq!(a.public_key, b.public_key);
        assert_eq!(*a.private_key, *b.private_key);
        assert_ne!(a.public_key, c.public_key);

        assert!(matches!(
            sphincs.generate_key_pair_from_seed(&[7u8; 31]),
            Err(CryptoError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let sphincs = SphincsPlus::new(SphincsParams::default()).unwrap();
        let keys = sphincs.generate_key_pair_from_seed(&[1u8; 32]).unwrap();
        let signature = sphincs.sign(b"msg", &keys.private_key).unwrap().into_bytes();

        for idx in [0, 31, 32, 100, signature.len() - 1] {
            let mut bad = signature.clone();
            bad[idx] ^= 0x80;
            assert!(!sphincs.verify(b"msg", &bad, &keys.public_key), "byte {}", idx);
        }
    }

    #[test]
    fn test_malformed_inputs_are_false() {
        let sphincs = SphincsPlus::new(SphincsParams::default()).unwrap();
        let keys = sphincs.generate_key_pair_from_seed(&[2u8; 32]).unwrap();
        let signature = sphincs.sign(b"msg", &keys.private_key).unwrap();

        assert!(!sphincs.verify(b"msg", &[], &keys.public_key));
        assert!(!sphincs.verify(b"msg", &signature.as_bytes()[..100], &keys.public_key));
        assert!(!sphincs.verify(b"msg", signature.as_bytes(), &keys.public_key[..10]));

        let other = sphincs.generate_key_pair_from_seed(&[3u8; 32]).unwrap();
        assert!(!sphincs.verify(b"msg", signature.as_bytes(), &other.public_key));

        assert!(matches!(
            sphincs.sign(b"msg", &[0u8; 10]),
            Err(CryptoError::InvalidKeyFormat(_))
        ));
    }

    #[test]
    fn test_other_parameter_sets() {
        for (n, w) in [(16, 4), (24, 256), (64, 16)] {
            let sphincs = SphincsPlus::new(SphincsParams::new(n, w, 4).unwrap()).unwrap();
            let keys = sphincs.generate_key_pair_from_seed(&vec![9u8; n]).unwrap();
            let signature = sphincs.sign(b"params", &keys.private_key).unwrap();
            assert!(sphincs.verify(b"params", signature.as_bytes(), &keys.public_key));
        }
    }

    #[test]
    fn test_height_tag_binds_root() {
        let a = SphincsPlus::new(SphincsParams::new(32, 16, 8).unwrap()).unwrap();
        let b = SphincsPlus::new(SphincsParams::new(32, 16, 9).unwrap()).unwrap();
        let ka = a.generate_key_pair_from_seed(&[4u8; 32]).unwrap();
        let kb = b.generate_key_pair_from_seed(&[4u8; 32]).unwrap();
        assert_ne!(ka.public_key, kb.public_key);
    }
}
