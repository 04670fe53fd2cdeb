//! Dilithium-style module-lattice signatures
//!
//! Arithmetic is in `R_q = Z_q[X]/(X^256 + 1)` with `q = 8380417`. The
//! public matrix has a single row of `l` polynomials expanded from the key
//! seed with BLAKE2b, and the public key carries the full `t = A·s1 + s2`,
//! so verification needs no hints.
//!
//! Signing is Fiat–Shamir with aborts: a masking vector `y`, commitment
//! `w = A·y`, challenge `c` from `H(HighBits(w) ‖ μ)`, response
//! `z = y + c·s1`, retried until `z` and `LowBits(w - c·s2)` are small.

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use qsafe_core::constants::{DILITHIUM2_PUBLIC_KEY_SIZE, DILITHIUM3_PUBLIC_KEY_SIZE, DILITHIUM5_PUBLIC_KEY_SIZE};
use qsafe_core::{CryptoError, DilithiumConfig, Result, SecurityLevel};
use qsafe_random::Csprng;
use qsafe_symmetric::blake2b::{blake2b_256, blake2b_512, expand};

/// Modulus
pub const Q: i32 = 8_380_417;

/// Ring degree
pub const N: usize = 256;

const MAX_SIGN_ATTEMPTS: usize = 512;

const DOMAIN_MATRIX: &[u8] = b"qsafe/dilithium/A";
const DOMAIN_CHALLENGE: &[u8] = b"qsafe/dilithium/challenge";

type Poly = [i32; N];

// ============================================================================
// Parameters
// ============================================================================

/// Nominal security level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DilithiumLevel {
    Two,
    Three,
    Five,
}

impl DilithiumLevel {
    pub const ALL: [DilithiumLevel; 3] = [Self::Two, Self::Three, Self::Five];

    pub fn from_number(level: u8) -> Result<Self> {
        match level {
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            5 => Ok(Self::Five),
            other => Err(CryptoError::InvalidParameter(format!(
                "Dilithium level must be 2, 3 or 5, got {}",
                other
            ))),
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Self::Two => 2,
            Self::Three => 3,
            Self::Five => 5,
        }
    }

    pub fn security_level(&self) -> SecurityLevel {
        match self {
            Self::Two => SecurityLevel::Level2,
            Self::Three => SecurityLevel::Level3,
            Self::Five => SecurityLevel::Level5,
        }
    }

    /// Matrix seed length in bytes
    pub fn seed_len(&self) -> usize {
        match self {
            Self::Two => 32,
            Self::Three => 48,
            Self::Five => 64,
        }
    }

    /// Rank of `s1`
    pub fn l(&self) -> usize {
        match self {
            Self::Two => 4,
            Self::Three => 5,
            Self::Five => 7,
        }
    }

    pub fn eta(&self) -> i32 {
        match self {
            Self::Two | Self::Five => 2,
            Self::Three => 4,
        }
    }

    /// Non-zero challenge coefficients
    pub fn tau(&self) -> usize {
        match self {
            Self::Two => 39,
            Self::Three => 49,
            Self::Five => 60,
        }
    }

    pub fn beta(&self) -> i32 {
        self.tau() as i32 * self.eta()
    }

    pub fn gamma1(&self) -> i32 {
        match self {
            Self::Two => 1 << 17,
            Self::Three | Self::Five => 1 << 19,
        }
    }

    pub fn gamma2(&self) -> i32 {
        match self {
            Self::Two => (Q - 1) / 88,
            Self::Three | Self::Five => (Q - 1) / 32,
        }
    }

    pub fn public_key_size(&self) -> usize {
        match self {
            Self::Two => DILITHIUM2_PUBLIC_KEY_SIZE,
            Self::Three => DILITHIUM3_PUBLIC_KEY_SIZE,
            Self::Five => DILITHIUM5_PUBLIC_KEY_SIZE,
        }
    }

    pub fn private_key_size(&self) -> usize {
        match self {
            Self::Two => 6400,
            Self::Three => 7424,
            Self::Five => 9472,
        }
    }

    /// `(256 + 256·l) · 4`
    pub fn signature_size(&self) -> usize {
        (N + N * self.l()) * 4
    }

    /// Level identified by a serialized public key's length
    pub fn from_public_key_size(len: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.public_key_size() == len)
    }

    pub fn from_private_key_size(len: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.private_key_size() == len)
    }
}

impl std::fmt::Display for DilithiumLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dilithium{}", self.number())
    }
}

// ============================================================================
// Keys
// ============================================================================

/// Serialized key pair; the private half is zeroized on drop
#[derive(Clone)]
pub struct DilithiumKeyPair {
    pub level: DilithiumLevel,
    pub public_key: Vec<u8>,
    pub private_key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for DilithiumKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DilithiumKeyPair")
            .field("level", &self.level)
            .field("public_key_len", &self.public_key.len())
            .finish_non_exhaustive()
    }
}

struct PublicKey {
    seed: Vec<u8>,
    t: Poly,
}

struct PrivateKey {
    seed: Vec<u8>,
    s1: Vec<Poly>,
    s2: Poly,
    t: Poly,
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        for poly in self.s1.iter_mut() {
            poly.zeroize();
        }
        self.s2.zeroize();
        self.seed.zeroize();
    }
}

fn encode_public(level: DilithiumLevel, seed: &[u8], t: &Poly) -> Vec<u8> {
    let mut out = Vec::with_capacity(level.public_key_size());
    out.extend_from_slice(seed);
    for &coeff in t.iter() {
        out.extend_from_slice(&(coeff as u32).to_le_bytes());
    }
    out.resize(level.public_key_size(), 0);
    out
}

fn decode_public(level: DilithiumLevel, bytes: &[u8]) -> Result<PublicKey> {
    if bytes.len() != level.public_key_size() {
        return Err(CryptoError::InvalidKeyFormat(format!(
            "{} public key must be {} bytes, got {}",
            level,
            level.public_key_size(),
            bytes.len()
        )));
    }
    let seed_len = level.seed_len();
    let seed = bytes[..seed_len].to_vec();
    let t = read_poly(&bytes[seed_len..seed_len + N * 4], |w| {
        let v = w as i32;
        (0..Q).contains(&v).then_some(v)
    })
    .ok_or_else(|| CryptoError::InvalidKeyFormat("t coefficient out of range".to_string()))?;
    Ok(PublicKey { seed, t })
}

fn encode_private(level: DilithiumLevel, key: &PrivateKey) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(level.private_key_size()));
    out.extend_from_slice(&key.seed);
    for poly in key.s1.iter().chain(std::iter::once(&key.s2)) {
        for &coeff in poly.iter() {
            out.extend_from_slice(&coeff.to_le_bytes());
        }
    }
    for &coeff in key.t.iter() {
        out.extend_from_slice(&(coeff as u32).to_le_bytes());
    }
    out.resize(level.private_key_size(), 0);
    out
}

fn decode_private(level: DilithiumLevel, bytes: &[u8]) -> Result<PrivateKey> {
    if bytes.len() != level.private_key_size() {
        return Err(CryptoError::InvalidKeyFormat(format!(
            "{} private key must be {} bytes, got {}",
            level,
            level.private_key_size(),
            bytes.len()
        )));
    }
    let eta = level.eta();
    let small = |w: u32| {
        let v = w as i32;
        (-eta..=eta).contains(&v).then_some(v)
    };
    let bad = || CryptoError::InvalidKeyFormat("secret coefficient out of range".to_string());

    let seed_len = level.seed_len();
    let mut offset = seed_len;
    let mut s1 = Vec::with_capacity(level.l());
    for _ in 0..level.l() {
        s1.push(read_poly(&bytes[offset..offset + N * 4], small).ok_or_else(bad)?);
        offset += N * 4;
    }
    let s2 = read_poly(&bytes[offset..offset + N * 4], small).ok_or_else(bad)?;
    offset += N * 4;
    let t = read_poly(&bytes[offset..offset + N * 4], |w| {
        let v = w as i32;
        (0..Q).contains(&v).then_some(v)
    })
    .ok_or_else(bad)?;

    Ok(PrivateKey {
        seed: bytes[..seed_len].to_vec(),
        s1,
        s2,
        t,
    })
}

fn read_poly(bytes: &[u8], check: impl Fn(u32) -> Option<i32>) -> Option<Poly> {
    let mut poly = [0i32; N];
    for (coeff, chunk) in poly.iter_mut().zip(bytes.chunks_exact(4)) {
        *coeff = check(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))?;
    }
    Some(poly)
}

// ============================================================================
// Signatures
// ============================================================================

/// Parsed signature `(c, z)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DilithiumSignature {
    c: Poly,
    z: Vec<Poly>,
}

/// `c` as 256 i32 LE words followed by `z`
pub fn serialize_signature(signature: &DilithiumSignature) -> Vec<u8> {
    let mut out = Vec::with_capacity((N + N * signature.z.len()) * 4);
    for poly in std::iter::once(&signature.c).chain(signature.z.iter()) {
        for &coeff in poly.iter() {
            out.extend_from_slice(&coeff.to_le_bytes());
        }
    }
    out
}

/// Parse a signature for a given level
pub fn deserialize_signature(bytes: &[u8], level: DilithiumLevel) -> Result<DilithiumSignature> {
    let expected = level.signature_size();
    if bytes.len() != expected {
        return Err(CryptoError::InvalidSignatureData {
            expected,
            actual: bytes.len(),
        });
    }

    let signed = |w: u32| Some(w as i32);
    let mut polys = bytes.chunks_exact(N * 4).filter_map(|chunk| read_poly(chunk, signed));
    let c = polys.next().ok_or(CryptoError::InvalidSignatureData {
        expected,
        actual: bytes.len(),
    })?;
    let z: Vec<Poly> = polys.collect();
    Ok(DilithiumSignature { c, z })
}

// ============================================================================
// Dilithium
// ============================================================================

/// Signer/verifier for one security level
#[derive(Clone, Debug)]
pub struct Dilithium {
    level: DilithiumLevel,
}

impl Dilithium {
    pub fn new(level: DilithiumLevel) -> Self {
        Self { level }
    }

    pub fn from_config(config: &DilithiumConfig) -> Result<Self> {
        Ok(Self::new(DilithiumLevel::from_number(config.level)?))
    }

    pub fn level(&self) -> DilithiumLevel {
        self.level
    }

    pub fn generate_key_pair(&self, rng: &Csprng) -> Result<DilithiumKeyPair> {
        let level = self.level;
        let seed = rng.random_bytes(level.seed_len())?;
        let a = expand_matrix(&seed, level.l());

        let s1 = (0..level.l())
            .map(|_| sample_eta(rng, level.eta()))
            .collect::<Result<Vec<_>>>()?;
        let s2 = sample_eta(rng, level.eta())?;

        let mut t = mat_vec(&a, &s1);
        for (coeff, &e) in t.iter_mut().zip(s2.iter()) {
            *coeff = reduce(*coeff as i64 + e as i64);
        }

        let public_key = encode_public(level, &seed, &t);
        let private = PrivateKey { seed, s1, s2, t };
        let private_key = encode_private(level, &private);

        tracing::debug!(%level, pk_len = public_key.len(), "generated Dilithium key pair");
        Ok(DilithiumKeyPair {
            level,
            public_key,
            private_key,
        })
    }

    pub fn sign(&self, message: &[u8], private_key: &[u8], rng: &Csprng) -> Result<Vec<u8>> {
        let level = self.level;
        let sk = decode_private(level, private_key)?;
        let public_key = encode_public(level, &sk.seed, &sk.t);
        let mu = message_representative(&public_key, message);
        let a = expand_matrix(&sk.seed, level.l());

        let gamma1 = level.gamma1();
        let gamma2 = level.gamma2();
        let beta = level.beta();

        for attempt in 1..=MAX_SIGN_ATTEMPTS {
            let mut y = (0..level.l())
                .map(|_| sample_mask(rng, gamma1))
                .collect::<Result<Vec<_>>>()?;

            let w = mat_vec(&a, &y);
            let w1 = w.map(|coeff| decompose(coeff, gamma2).0);
            let c = sample_in_ball(&challenge_seed(&mu, &w1), level.tau());

            let z: Vec<Poly> = y
                .iter()
                .zip(sk.s1.iter())
                .map(|(yi, s1i)| {
                    let cs1 = poly_mul(&c, s1i);
                    let mut zi = [0i32; N];
                    for k in 0..N {
                        zi[k] = center(reduce(yi[k] as i64 + cs1[k] as i64));
                    }
                    zi
                })
                .collect();
            for poly in y.iter_mut() {
                poly.zeroize();
            }

            if z.iter().any(|zi| inf_norm(zi) >= gamma1 - beta) {
                continue;
            }

            let cs2 = poly_mul(&c, &sk.s2);
            let low_ok = w.iter().zip(cs2.iter()).all(|(&wk, &ck)| {
                let r0 = decompose(reduce(wk as i64 - ck as i64), gamma2).1;
                r0.abs() < gamma2 - beta
            });
            if !low_ok {
                continue;
            }

            tracing::trace!(attempt, "Dilithium signature accepted");
            return Ok(serialize_signature(&DilithiumSignature { c, z }));
        }

        Err(CryptoError::InvalidParameter(
            "Dilithium rejection sampling did not converge".to_string(),
        ))
    }

    /// Check a signature. Malformed keys or signatures are simply invalid.
    pub fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        let level = self.level;
        let pk = match decode_public(level, public_key) {
            Ok(pk) => pk,
            Err(_) => return false,
        };
        let sig = match deserialize_signature(signature, level) {
            Ok(sig) => sig,
            Err(_) => return false,
        };

        if sig.c.iter().any(|&v| !(-1..=1).contains(&v))
            || sig.c.iter().filter(|&&v| v != 0).count() != level.tau()
        {
            return false;
        }
        if sig.z.len() != level.l() || sig.z.iter().any(|zi| inf_norm(zi) >= level.gamma1() - level.beta()) {
            return false;
        }

        let a = expand_matrix(&pk.seed, level.l());
        let az = mat_vec(&a, &sig.z);
        let ct = poly_mul(&sig.c, &pk.t);

        let mut w1 = [0i32; N];
        for k in 0..N {
            let w = reduce(az[k] as i64 - ct[k] as i64);
            w1[k] = decompose(w, level.gamma2()).0;
        }

        let mu = message_representative(public_key, message);
        let c_prime = sample_in_ball(&challenge_seed(&mu, &w1), level.tau());

        let lhs = serialize_poly(&c_prime);
        let rhs = serialize_poly(&sig.c);
        bool::from(lhs.as_slice().ct_eq(rhs.as_slice()))
    }
}

// ============================================================================
// Ring arithmetic and sampling
// ============================================================================

fn reduce(x: i64) -> i32 {
    x.rem_euclid(Q as i64) as i32
}

/// Map `[0, q)` to `(-(q-1)/2, (q-1)/2]`
fn center(x: i32) -> i32 {
    if x > (Q - 1) / 2 {
        x - Q
    } else {
        x
    }
}

fn inf_norm(poly: &Poly) -> i32 {
    poly.iter().map(|&c| center(reduce(c as i64)).abs()).max().unwrap_or(0)
}

/// Negacyclic schoolbook product in `R_q`, result in `[0, q)`
fn poly_mul(a: &Poly, b: &Poly) -> Poly {
    let mut acc = [0i64; N];
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0 {
            continue;
        }
        let ai = ai as i64;
        for (j, &bj) in b.iter().enumerate() {
            let product = ai * bj as i64;
            let k = i + j;
            if k < N {
                acc[k] += product;
            } else {
                acc[k - N] -= product;
            }
        }
    }
    acc.map(reduce)
}

/// Single-row matrix times vector: `Σ a_j · v_j`
fn mat_vec(a: &[Poly], v: &[Poly]) -> Poly {
    let mut acc = [0i64; N];
    for (aj, vj) in a.iter().zip(v.iter()) {
        let product = poly_mul(aj, vj);
        for (sum, &p) in acc.iter_mut().zip(product.iter()) {
            *sum += p as i64;
        }
    }
    acc.map(reduce)
}

/// `r = r1·2γ2 + r0` with `r0 ∈ (-γ2, γ2]`
fn decompose(r: i32, gamma2: i32) -> (i32, i32) {
    let two_gamma2 = 2 * gamma2;
    let mut r0 = r % two_gamma2;
    if r0 > gamma2 {
        r0 -= two_gamma2;
    }
    if r - r0 == Q - 1 {
        (0, r0 - 1)
    } else {
        ((r - r0) / two_gamma2, r0)
    }
}

fn expand_matrix(seed: &[u8], l: usize) -> Vec<Poly> {
    (0..l)
        .map(|j| {
            let mut domain = DOMAIN_MATRIX.to_vec();
            domain.push(j as u8);

            let mut len = N * 3 + 192;
            loop {
                let stream = expand(seed, &domain, len);
                let mut poly = [0i32; N];
                let mut filled = 0;
                for chunk in stream.chunks_exact(3) {
                    let v = (u32::from_le_bytes([chunk[0], chunk[1], chunk[2], 0]) & 0x7f_ffff) as i32;
                    if v < Q {
                        poly[filled] = v;
                        filled += 1;
                        if filled == N {
                            return poly;
                        }
                    }
                }
                len *= 2;
            }
        })
        .collect()
}

/// Uniform coefficients in `[-η, η]` by rejection on single bytes
fn sample_eta(rng: &Csprng, eta: i32) -> Result<Poly> {
    let modulus = (2 * eta + 1) as u32;
    let limit = 256 - 256 % modulus;
    let mut poly = [0i32; N];
    let mut filled = 0;
    while filled < N {
        let mut bytes = rng.random_bytes(N - filled + 16)?;
        for &b in bytes.iter() {
            if (b as u32) < limit && filled < N {
                poly[filled] = eta - (b as u32 % modulus) as i32;
                filled += 1;
            }
        }
        bytes.zeroize();
    }
    Ok(poly)
}

/// Masking polynomial with coefficients in `(-γ1, γ1]`
fn sample_mask(rng: &Csprng, gamma1: i32) -> Result<Poly> {
    let mut bytes = rng.random_bytes(N * 4)?;
    let span_mask = (2 * gamma1 as u32) - 1;
    let mut poly = [0i32; N];
    for (coeff, chunk) in poly.iter_mut().zip(bytes.chunks_exact(4)) {
        let u = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) & span_mask;
        *coeff = gamma1 - u as i32;
    }
    bytes.zeroize();
    Ok(poly)
}

/// `μ = H(H(pk) ‖ message)`
fn message_representative(public_key: &[u8], message: &[u8]) -> [u8; 64] {
    let tr = blake2b_512(&[public_key]);
    blake2b_512(&[&tr, message])
}

fn challenge_seed(mu: &[u8; 64], w1: &Poly) -> [u8; 32] {
    let encoded = serialize_poly(w1);
    blake2b_256(&[DOMAIN_CHALLENGE, mu, &encoded])
}

/// Ternary polynomial with exactly `tau` non-zero coefficients
fn sample_in_ball(seed: &[u8; 32], tau: usize) -> Poly {
    let mut len = 8 + 2 * N;
    loop {
        let stream = expand(seed, DOMAIN_CHALLENGE, len);
        let mut signs = u64::from_le_bytes([
            stream[0], stream[1], stream[2], stream[3], stream[4], stream[5], stream[6], stream[7],
        ]);
        let mut bytes = stream[8..].iter();
        let mut c = [0i32; N];
        let mut complete = true;

        for i in (N - tau)..N {
            let j = loop {
                match bytes.next() {
                    Some(&b) if (b as usize) <= i => break Some(b as usize),
                    Some(_) => continue,
                    None => break None,
                }
            };
            let Some(j) = j else {
                complete = false;
                break;
            };
            c[i] = c[j];
            c[j] = 1 - 2 * (signs & 1) as i32;
            signs >>= 1;
        }

        if complete {
            return c;
        }
        len *= 2;
    }
}

fn serialize_poly(poly: &Poly) -> Vec<u8> {
    poly.iter().flat_map(|c| c.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> Csprng {
        Csprng::with_defaults().unwrap().0
    }

    #[test]
    fn test_level_parameters() {
        let two = DilithiumLevel::Two;
        assert_eq!(two.beta(), 78);
        assert_eq!(two.gamma2(), 95_232);
        assert_eq!(two.signature_size(), (256 + 1024) * 4);
        assert_eq!(DilithiumLevel::Three.beta(), 196);
        assert_eq!(DilithiumLevel::Five.l(), 7);

        for level in DilithiumLevel::ALL {
            let payload = level.seed_len() + N * 4;
            assert!(payload <= level.public_key_size());
            let secret = level.seed_len() + (level.l() + 2) * N * 4;
            assert!(secret <= level.private_key_size());
            assert_eq!(DilithiumLevel::from_public_key_size(level.public_key_size()), Some(level));
        }
        assert!(DilithiumLevel::from_number(4).is_err());
    }

    #[test]
    fn test_decompose() {
        let gamma2 = DilithiumLevel::Three.gamma2();
        for r in [0, 1, gamma2, gamma2 + 1, Q / 2, Q - 2, Q - 1] {
            let (r1, r0) = decompose(r, gamma2);
            assert!(r0 > -gamma2 - 1 && r0 <= gamma2, "r0 {} for r {}", r0, r);
            assert_eq!(reduce(r1 as i64 * 2 * gamma2 as i64 + r0 as i64), r);
        }
        assert_eq!(decompose(Q - 1, gamma2).0, 0);
    }

    #[test]
    fn test_poly_mul_negacyclic() {
        // X^255 · X = X^256 = -1
        let mut a = [0i32; N];
        let mut b = [0i32; N];
        a[255] = 1;
        b[1] = 1;
        let product = poly_mul(&a, &b);
        assert_eq!(product[0], Q - 1);
        assert!(product[1..].iter().all(|&c| c == 0));
    }

    #[test]
    fn test_sample_in_ball_weight() {
        for tau in [39, 49, 60] {
            let c = sample_in_ball(&[tau as u8; 32], tau);
            assert_eq!(c.iter().filter(|&&v| v != 0).count(), tau);
            assert!(c.iter().all(|&v| (-1..=1).contains(&v)));
        }
        assert_eq!(sample_in_ball(&[1u8; 32], 39), sample_in_ball(&[1u8; 32], 39));
    }

    #[test]
    fn test_sign_verify_all_levels() {
        let rng = rng();
        for level in DilithiumLevel::ALL {
            let dilithium = Dilithium::new(level);
            let keys = dilithium.generate_key_pair(&rng).unwrap();
            assert_eq!(keys.public_key.len(), level.public_key_size());
            assert_eq!(keys.private_key.len(), level.private_key_size());

            let signature = dilithium.sign(b"lattice message", &keys.private_key, &rng).unwrap();
            assert_eq!(signature.len(), level.signature_size());
            assert!(dilithium.verify(b"lattice message", &signature, &keys.public_key), "{}", level);
            assert!(!dilithium.verify(b"lattice messagf", &signature, &keys.public_key));
        }
    }

    #[test]
    fn test_public_key_padding_is_zero() {
        let rng = rng();
        let keys = Dilithium::new(DilithiumLevel::Two).generate_key_pair(&rng).unwrap();
        let payload = DilithiumLevel::Two.seed_len() + N * 4;
        assert!(keys.public_key[payload..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_wrong_key_and_tampering() {
        let rng = rng();
        let dilithium = Dilithium::new(DilithiumLevel::Two);
        let alice = dilithium.generate_key_pair(&rng).unwrap();
        let bob = dilithium.generate_key_pair(&rng).unwrap();
        let signature = dilithium.sign(b"msg", &alice.private_key, &rng).unwrap();

        assert!(!dilithium.verify(b"msg", &signature, &bob.public_key));

        // flip a z coefficient
        let mut bad_z = signature.clone();
        bad_z[N * 4 + 8] ^= 0x01;
        assert!(!dilithium.verify(b"msg", &bad_z, &alice.public_key));

        // c outside {-1, 0, 1}
        let mut bad_c = signature.clone();
        bad_c[..4].copy_from_slice(&5i32.to_le_bytes());
        assert!(!dilithium.verify(b"msg", &bad_c, &alice.public_key));
    }

    #[test]
    fn test_signature_parsing() {
        let level = DilithiumLevel::Two;
        let short = vec![0u8; (N + 10) * 4];
        assert_eq!(
            deserialize_signature(&short, level).unwrap_err(),
            CryptoError::InvalidSignatureData {
                expected: level.signature_size(),
                actual: short.len()
            }
        );

        let zeros = vec![0u8; level.signature_size()];
        let parsed = deserialize_signature(&zeros, level).unwrap();
        assert_eq!(parsed.z.len(), 4);
        assert_eq!(serialize_signature(&parsed), zeros);
    }

    #[test]
    fn test_malformed_keys() {
        let rng = rng();
        let dilithium = Dilithium::new(DilithiumLevel::Three);
        assert!(matches!(
            dilithium.sign(b"m", &[0u8; 100], &rng),
            Err(CryptoError::InvalidKeyFormat(_))
        ));
        assert!(!dilithium.verify(b"m", &[0u8; 100], &[0u8; 1952]));

        // level 2 key against a level 3 instance
        let keys = Dilithium::new(DilithiumLevel::Two).generate_key_pair(&rng).unwrap();
        assert!(dilithium.sign(b"m", &keys.private_key, &rng).is_err());
    }
}
