//! Sizing tables, symmetric-key encapsulation and a timing harness
//!
//! [`QuantumSafeUtils`] answers questions about the configured parameter
//! sets without generating any keys, and times the three post-quantum
//! families end to end.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use zeroize::Zeroizing;

use qsafe_core::constants::{
    BLAKE2B_MAX_KEY, BLAKE2B_MAX_OUTPUT, CHACHA20_NONCE_SIZE, ED25519_PUBLIC_KEY_SIZE, ED25519_SIGNATURE_SIZE,
    KEY_SIZE, TAG_SIZE, X25519_PUBLIC_KEY_SIZE, XSALSA20_NONCE_SIZE,
};
use qsafe_core::{Algorithm, CryptoError, QSafeConfig, Result, SecurityLevel};
use qsafe_random::Csprng;
use qsafe_symmetric::blake2b::blake2b_512;

use crate::dilithium::{Dilithium, DilithiumLevel};
use crate::lwe::{LweCrypto, LweParams, LwePrivateKey, LwePublicKey};
use crate::sphincs::{SphincsParams, SphincsPlus};

/// Nonce length of [`QuantumSafeUtils::hybrid_encrypt`]
pub const ENCAPSULATION_NONCE_SIZE: usize = 16;

const ENCAPSULATION_DOMAIN: &[u8] = b"qsafe/encapsulate";

/// Serialized sizes for one algorithm family, in bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct KeySizes {
    /// Public key, absent for symmetric families
    pub public_key: Option<usize>,
    /// Private or shared secret key
    pub secret_key: usize,
    pub signature: Option<usize>,
    pub nonce: Option<usize>,
    /// Authentication tag or digest
    pub output: Option<usize>,
}

/// Timing of one operation across all iterations
#[derive(Clone, Debug, Serialize)]
pub struct OperationTiming {
    pub algorithm: Algorithm,
    pub operation: &'static str,
    pub iterations: u32,
    pub total: Duration,
}

impl OperationTiming {
    pub fn mean(&self) -> Duration {
        self.total / self.iterations.max(1)
    }

    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.total.as_secs_f64();
        if secs == 0.0 {
            return f64::INFINITY;
        }
        self.iterations as f64 / secs
    }
}

/// Output of [`QuantumSafeUtils::benchmark`]
#[derive(Clone, Debug, Default, Serialize)]
pub struct BenchmarkReport {
    pub timings: Vec<OperationTiming>,
}

impl BenchmarkReport {
    pub fn get(&self, algorithm: Algorithm, operation: &str) -> Option<&OperationTiming> {
        self.timings
            .iter()
            .find(|t| t.algorithm == algorithm && t.operation == operation)
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<12} {:<10} {:>8} {:>14} {:>12}", "algorithm", "operation", "iters", "mean", "ops/sec")?;
        for t in &self.timings {
            writeln!(
                f,
                "{:<12} {:<10} {:>8} {:>14?} {:>12.1}",
                t.algorithm.to_string(),
                t.operation,
                t.iterations,
                t.mean(),
                t.ops_per_sec()
            )?;
        }
        Ok(())
    }
}

/// Lookup tables and helpers bound to one set of parameters
#[derive(Clone, Debug)]
pub struct QuantumSafeUtils {
    lwe: LweParams,
    sphincs: SphincsParams,
    dilithium: DilithiumLevel,
}

impl Default for QuantumSafeUtils {
    fn default() -> Self {
        Self {
            lwe: LweParams::default(),
            sphincs: SphincsParams::default(),
            dilithium: DilithiumLevel::Two,
        }
    }
}

impl QuantumSafeUtils {
    pub fn new(lwe: LweParams, sphincs: SphincsParams, dilithium: DilithiumLevel) -> Result<Self> {
        lwe.validate()?;
        sphincs.validate()?;
        Ok(Self {
            lwe,
            sphincs,
            dilithium,
        })
    }

    pub fn from_config(config: &QSafeConfig) -> Result<Self> {
        Self::new(
            LweParams::from_config(&config.lwe)?,
            SphincsParams::from_config(&config.sphincs)?,
            DilithiumLevel::from_number(config.dilithium.level)?,
        )
    }

    pub fn lwe_params(&self) -> &LweParams {
        &self.lwe
    }

    pub fn sphincs_params(&self) -> &SphincsParams {
        &self.sphincs
    }

    pub fn dilithium_level(&self) -> DilithiumLevel {
        self.dilithium
    }

    /// Nominal security category under the configured parameters
    pub fn security_level(&self, algorithm: Algorithm) -> SecurityLevel {
        match algorithm {
            Algorithm::ChaCha20 | Algorithm::XSalsa20 | Algorithm::ChaCha20Poly1305 | Algorithm::Blake2b => {
                SecurityLevel::Level5
            }
            // 128-bit one-time authenticator
            Algorithm::Poly1305 => SecurityLevel::Level1,
            Algorithm::Lwe => lwe_level(self.lwe.n),
            Algorithm::Sphincs => match self.sphincs.n {
                n if n >= 32 => SecurityLevel::Level5,
                n if n >= 24 => SecurityLevel::Level3,
                _ => SecurityLevel::Level1,
            },
            Algorithm::Dilithium => self.dilithium.security_level(),
            Algorithm::Hybrid => lwe_level(self.lwe.n).min(self.dilithium.security_level()),
        }
    }

    pub fn key_sizes(&self, algorithm: Algorithm) -> KeySizes {
        let symmetric = |nonce: Option<usize>, output: Option<usize>| KeySizes {
            public_key: None,
            secret_key: KEY_SIZE,
            signature: None,
            nonce,
            output,
        };

        match algorithm {
            Algorithm::ChaCha20 => symmetric(Some(CHACHA20_NONCE_SIZE), None),
            Algorithm::XSalsa20 => symmetric(Some(XSALSA20_NONCE_SIZE), None),
            Algorithm::Poly1305 => symmetric(None, Some(TAG_SIZE)),
            Algorithm::ChaCha20Poly1305 => symmetric(Some(CHACHA20_NONCE_SIZE), Some(TAG_SIZE)),
            Algorithm::Blake2b => KeySizes {
                public_key: None,
                secret_key: BLAKE2B_MAX_KEY,
                signature: None,
                nonce: None,
                output: Some(BLAKE2B_MAX_OUTPUT),
            },
            Algorithm::Lwe => KeySizes {
                public_key: Some(self.lwe.public_key_size()),
                secret_key: self.lwe.private_key_size(),
                signature: None,
                nonce: None,
                output: None,
            },
            Algorithm::Sphincs => KeySizes {
                public_key: Some(self.sphincs.public_key_size()),
                secret_key: self.sphincs.private_key_size(),
                signature: Some(self.sphincs.signature_size()),
                nonce: None,
                output: None,
            },
            Algorithm::Dilithium => KeySizes {
                public_key: Some(self.dilithium.public_key_size()),
                secret_key: self.dilithium.private_key_size(),
                signature: Some(self.dilithium.signature_size()),
                nonce: None,
                output: None,
            },
            // Length-prefixed bundles as produced by the hybrid key types
            Algorithm::Hybrid => KeySizes {
                public_key: Some(
                    X25519_PUBLIC_KEY_SIZE
                        + ED25519_PUBLIC_KEY_SIZE
                        + 8
                        + self.lwe.public_key_size()
                        + self.dilithium.public_key_size(),
                ),
                secret_key: KEY_SIZE + KEY_SIZE + 8 + self.lwe.private_key_size() + self.dilithium.private_key_size(),
                signature: Some(self.dilithium.signature_size() + ED25519_SIGNATURE_SIZE),
                nonce: Some(CHACHA20_NONCE_SIZE),
                output: Some(TAG_SIZE),
            },
        }
    }

    /// Encapsulate a fresh session key to `lwe_public` and XOR-stream `data`
    ///
    /// Layout: `le32 len ‖ LWE ciphertext ‖ nonce ‖ masked payload`. The
    /// payload is masked, not authenticated: pair it with a MAC or use
    /// [`crate::HybridCrypto`] when integrity matters.
    pub fn hybrid_encrypt(
        &self,
        data: &[u8],
        lwe_public: &LwePublicKey,
        classical_key: &[u8],
        rng: &Csprng,
    ) -> Result<Vec<u8>> {
        check_classical_key(classical_key)?;
        let lwe = LweCrypto::new(self.lwe.clone())?;

        let session_key = Zeroizing::new(rng.random_array::<32>()?);
        let encapsulated = lwe.encrypt(session_key.as_slice(), lwe_public, rng)?;
        let nonce = rng.random_array::<ENCAPSULATION_NONCE_SIZE>()?;

        let mut out = Vec::with_capacity(4 + encapsulated.len() + ENCAPSULATION_NONCE_SIZE + data.len());
        out.extend_from_slice(&(encapsulated.len() as u32).to_le_bytes());
        out.extend_from_slice(&encapsulated);
        out.extend_from_slice(&nonce);
        let start = out.len();
        out.extend_from_slice(data);
        apply_mask(&mut out[start..], classical_key, session_key.as_slice(), &nonce);
        Ok(out)
    }

    /// Inverse of [`Self::hybrid_encrypt`]
    pub fn hybrid_decrypt(&self, data: &[u8], lwe_private: &LwePrivateKey, classical_key: &[u8]) -> Result<Vec<u8>> {
        check_classical_key(classical_key)?;
        let lwe = LweCrypto::new(self.lwe.clone())?;

        let truncated = || CryptoError::InvalidInput("encapsulated payload truncated".to_string());
        let header: [u8; 4] = data.get(..4).and_then(|h| h.try_into().ok()).ok_or_else(truncated)?;
        let kem_len = u32::from_le_bytes(header) as usize;
        let kem_end = 4usize.checked_add(kem_len).ok_or_else(truncated)?;
        let nonce_end = kem_end.checked_add(ENCAPSULATION_NONCE_SIZE).ok_or_else(truncated)?;
        if data.len() < nonce_end {
            return Err(truncated());
        }

        let session_key = Zeroizing::new(lwe.decrypt(&data[4..kem_end], lwe_private)?);
        if session_key.len() != KEY_SIZE {
            return Err(CryptoError::InvalidInput(format!(
                "session key must be {} bytes, got {}",
                KEY_SIZE,
                session_key.len()
            )));
        }

        let mut out = data[nonce_end..].to_vec();
        apply_mask(&mut out, classical_key, &session_key, &data[kem_end..nonce_end]);
        Ok(out)
    }

    /// Time keygen, encrypt/decrypt and sign/verify for each post-quantum family
    pub fn benchmark(&self, iterations: u32, rng: &Csprng) -> Result<BenchmarkReport> {
        if iterations == 0 {
            return Err(CryptoError::InvalidParameter("iterations must be positive".to_string()));
        }
        let message = rng.random_bytes(32)?;
        let mut report = BenchmarkReport::default();

        let lwe = LweCrypto::new(self.lwe.clone())?;
        let keys = time(&mut report, Algorithm::Lwe, "keygen", iterations, || {
            lwe.generate_key_pair(rng)
        })?;
        let ciphertext = time(&mut report, Algorithm::Lwe, "encrypt", iterations, || {
            lwe.encrypt(&message, &keys.public, rng)
        })?;
        time(&mut report, Algorithm::Lwe, "decrypt", iterations, || {
            lwe.decrypt(&ciphertext, &keys.private)
        })?;

        let sphincs = SphincsPlus::new(self.sphincs)?;
        let keys = time(&mut report, Algorithm::Sphincs, "keygen", iterations, || {
            sphincs.generate_key_pair(rng)
        })?;
        let signature = time(&mut report, Algorithm::Sphincs, "sign", iterations, || {
            sphincs.sign(&message, &keys.private_key)
        })?;
        time(&mut report, Algorithm::Sphincs, "verify", iterations, || {
            Ok(sphincs.verify(&message, signature.as_bytes(), &keys.public_key))
        })?;

        let dilithium = Dilithium::new(self.dilithium);
        let keys = time(&mut report, Algorithm::Dilithium, "keygen", iterations, || {
            dilithium.generate_key_pair(rng)
        })?;
        let signature = time(&mut report, Algorithm::Dilithium, "sign", iterations, || {
            dilithium.sign(&message, &keys.private_key, rng)
        })?;
        time(&mut report, Algorithm::Dilithium, "verify", iterations, || {
            Ok(dilithium.verify(&message, &signature, &keys.public_key))
        })?;

        tracing::debug!(iterations, operations = report.timings.len(), "benchmark finished");
        Ok(report)
    }
}

fn lwe_level(n: usize) -> SecurityLevel {
    match n {
        n if n >= 1024 => SecurityLevel::Level5,
        n if n >= 768 => SecurityLevel::Level3,
        _ => SecurityLevel::Level1,
    }
}

fn check_classical_key(key: &[u8]) -> Result<()> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::key_length(KEY_SIZE, key.len()));
    }
    Ok(())
}

/// XOR with `BLAKE2b-512(domain ‖ classical ‖ session ‖ nonce ‖ le64 ctr)` blocks
fn apply_mask(data: &mut [u8], classical_key: &[u8], session_key: &[u8], nonce: &[u8]) {
    for (ctr, chunk) in data.chunks_mut(BLAKE2B_MAX_OUTPUT).enumerate() {
        let ctr = (ctr as u64).to_le_bytes();
        let mut block = blake2b_512(&[ENCAPSULATION_DOMAIN, classical_key, session_key, nonce, &ctr]);
        for (byte, k) in chunk.iter_mut().zip(block.iter()) {
            *byte ^= k;
        }
        zeroize::Zeroize::zeroize(&mut block);
    }
}

/// Run `op` `iterations` times, record the total and return the last output
fn time<T>(
    report: &mut BenchmarkReport,
    algorithm: Algorithm,
    operation: &'static str,
    iterations: u32,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let start = Instant::now();
    let mut last = op()?;
    for _ in 1..iterations {
        last = op()?;
    }
    report.timings.push(OperationTiming {
        algorithm,
        operation,
        iterations,
        total: start.elapsed(),
    });
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_utils() -> QuantumSafeUtils {
        QuantumSafeUtils::new(
            LweParams::new(64).unwrap(),
            SphincsParams::default(),
            DilithiumLevel::Two,
        )
        .unwrap()
    }

    #[test]
    fn test_security_levels() {
        let utils = QuantumSafeUtils::default();
        assert_eq!(utils.security_level(Algorithm::ChaCha20Poly1305), SecurityLevel::Level5);
        assert_eq!(utils.security_level(Algorithm::Poly1305), SecurityLevel::Level1);
        assert_eq!(utils.security_level(Algorithm::Dilithium), SecurityLevel::Level2);
        assert_eq!(utils.security_level(Algorithm::Sphincs), SecurityLevel::Level5);
        assert_eq!(utils.security_level(Algorithm::Hybrid), SecurityLevel::Level1);
    }

    #[test]
    fn test_key_sizes_follow_parameters() {
        let utils = QuantumSafeUtils::default();

        let dilithium = utils.key_sizes(Algorithm::Dilithium);
        assert_eq!(dilithium.public_key, Some(1312));
        assert_eq!(dilithium.signature, Some(DilithiumLevel::Two.signature_size()));

        let aead = utils.key_sizes(Algorithm::ChaCha20Poly1305);
        assert_eq!(aead.public_key, None);
        assert_eq!(aead.secret_key, 32);
        assert_eq!(aead.nonce, Some(12));
        assert_eq!(aead.output, Some(16));

        let lwe = utils.key_sizes(Algorithm::Lwe);
        assert_eq!(lwe.public_key, Some((256 * 256 + 256) * 4));

        for algorithm in Algorithm::ALL {
            assert!(utils.key_sizes(algorithm).secret_key > 0);
        }
    }

    #[test]
    fn test_hybrid_key_size_matches_serialization() {
        let utils = small_utils();
        let (rng, _) = Csprng::with_defaults().unwrap();
        let hybrid = crate::HybridCrypto::new(utils.lwe_params().clone(), utils.dilithium_level()).unwrap();
        let keys = hybrid.generate_key_pair(&rng).unwrap();

        let sizes = utils.key_sizes(Algorithm::Hybrid);
        assert_eq!(sizes.public_key, Some(keys.public.to_bytes().len()));
        assert_eq!(sizes.secret_key, keys.secret.to_bytes().len());
    }

    #[test]
    fn test_hybrid_encrypt_roundtrip() {
        let utils = small_utils();
        let (rng, _) = Csprng::with_defaults().unwrap();
        let lwe = LweCrypto::new(utils.lwe_params().clone()).unwrap();
        let keys = lwe.generate_key_pair(&rng).unwrap();
        let classical = [0x42u8; 32];

        let data = b"a payload longer than one sixty-four byte keystream block, to cross it";
        let sealed = utils.hybrid_encrypt(data, &keys.public, &classical, &rng).unwrap();
        assert_eq!(utils.hybrid_decrypt(&sealed, &keys.private, &classical).unwrap(), data);

        // Wrong classical key unmasks to garbage
        let other = utils.hybrid_decrypt(&sealed, &keys.private, &[0x43u8; 32]).unwrap();
        assert_ne!(other, data);
    }

    #[test]
    fn test_hybrid_encrypt_rejects_bad_input() {
        let utils = small_utils();
        let (rng, _) = Csprng::with_defaults().unwrap();
        let lwe = LweCrypto::new(utils.lwe_params().clone()).unwrap();
        let keys = lwe.generate_key_pair(&rng).unwrap();

        assert!(matches!(
            utils.hybrid_encrypt(b"x", &keys.public, &[0u8; 16], &rng),
            Err(CryptoError::InvalidKeyLength { expected: 32, actual: 16 })
        ));
        assert!(matches!(
            utils.hybrid_decrypt(&[1, 0, 0], &keys.private, &[0u8; 32]),
            Err(CryptoError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_benchmark_report() {
        let utils = small_utils();
        let (rng, _) = Csprng::with_defaults().unwrap();

        let report = utils.benchmark(1, &rng).unwrap();
        assert_eq!(report.timings.len(), 9);
        assert!(report.get(Algorithm::Dilithium, "sign").is_some());
        assert!(report.get(Algorithm::Lwe, "sign").is_none());
        assert!(report.to_string().contains("sphincs"));

        assert!(utils.benchmark(0, &rng).is_err());
    }
}
