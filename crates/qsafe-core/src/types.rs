//! Shared type definitions and algorithm constants

use serde::{Deserialize, Serialize};
use std::fmt;

/// Algorithm size constants shared across crates
pub mod constants {
    /// Symmetric key size for ChaCha20, XSalsa20, Poly1305 and the AEAD
    pub const KEY_SIZE: usize = 32;

    /// ChaCha20 / ChaCha20-Poly1305 nonce size (96-bit)
    pub const CHACHA20_NONCE_SIZE: usize = 12;

    /// XSalsa20 nonce size (192-bit)
    pub const XSALSA20_NONCE_SIZE: usize = 24;

    /// Poly1305 / AEAD tag size
    pub const TAG_SIZE: usize = 16;

    /// Maximum BLAKE2b digest length
    pub const BLAKE2B_MAX_OUTPUT: usize = 64;

    /// Maximum BLAKE2b key length
    pub const BLAKE2B_MAX_KEY: usize = 64;

    /// Ring buffer bound per entropy source
    pub const MAX_SAMPLES_PER_SOURCE: usize = 256;

    /// Default CSPRNG seed length
    pub const DEFAULT_SEED_LENGTH: usize = 32;

    /// Default number of `random_bytes` calls between automatic reseeds
    pub const DEFAULT_RESEED_INTERVAL: u64 = 1000;

    /// Tolerated share of undecodable LWE bits before decryption aborts
    pub const LWE_MAX_DECODE_FAILURE_RATE: f64 = 0.05;

    /// Dilithium public key sizes per level (2, 3, 5)
    pub const DILITHIUM2_PUBLIC_KEY_SIZE: usize = 1312;
    pub const DILITHIUM3_PUBLIC_KEY_SIZE: usize = 1952;
    pub const DILITHIUM5_PUBLIC_KEY_SIZE: usize = 2592;

    /// Ed25519 / X25519 sizes used by the classical leg
    pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;
    pub const ED25519_SIGNATURE_SIZE: usize = 64;
    pub const X25519_PUBLIC_KEY_SIZE: usize = 32;
}

/// Strength of the entropy source a random generator ended up with
///
/// Returned from generator construction so that a downgrade has to be
/// handled by the caller instead of being discovered later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntropyTier {
    /// Operating system CSPRNG
    Strong,
    /// Time, performance counter and pseudo-random mix. Best effort only.
    Fallback,
}

impl EntropyTier {
    /// Whether output is suitable for key material
    pub fn is_strong(&self) -> bool {
        matches!(self, Self::Strong)
    }
}

impl fmt::Display for EntropyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strong => write!(f, "strong"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Requested entropy source for a random generator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntropySourceKind {
    /// Strongest available source, degrading to the fallback mix
    #[default]
    Auto,
    /// Operating system source only
    Os,
    /// Force the weak fallback mix (testing and constrained platforms)
    Fallback,
}

/// Nominal NIST post-quantum security category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SecurityLevel {
    Level1,
    Level2,
    Level3,
    Level5,
}

impl SecurityLevel {
    /// Approximate classical security in bits
    pub fn classical_bits(&self) -> u32 {
        match self {
            Self::Level1 => 128,
            Self::Level2 => 128,
            Self::Level3 => 192,
            Self::Level5 => 256,
        }
    }

    /// NIST category number
    pub fn category(&self) -> u8 {
        match self {
            Self::Level1 => 1,
            Self::Level2 => 2,
            Self::Level3 => 3,
            Self::Level5 => 5,
        }
    }
}

/// Closed set of algorithm families exposed to callers
///
/// Callers dispatch on this enum instead of algorithm name strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    ChaCha20,
    XSalsa20,
    Poly1305,
    ChaCha20Poly1305,
    Blake2b,
    Lwe,
    Sphincs,
    Dilithium,
    Hybrid,
}

impl Algorithm {
    /// All algorithm families
    pub const ALL: [Algorithm; 9] = [
        Self::ChaCha20,
        Self::XSalsa20,
        Self::Poly1305,
        Self::ChaCha20Poly1305,
        Self::Blake2b,
        Self::Lwe,
        Self::Sphincs,
        Self::Dilithium,
        Self::Hybrid,
    ];

    /// Whether the family is believed to resist quantum adversaries
    pub fn is_post_quantum(&self) -> bool {
        matches!(self, Self::Lwe | Self::Sphincs | Self::Dilithium | Self::Hybrid)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ChaCha20 => "chacha20",
            Self::XSalsa20 => "xsalsa20",
            Self::Poly1305 => "poly1305",
            Self::ChaCha20Poly1305 => "chacha20-poly1305",
            Self::Blake2b => "blake2b",
            Self::Lwe => "lwe",
            Self::Sphincs => "sphincs",
            Self::Dilithium => "dilithium",
            Self::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_tier() {
        assert!(EntropyTier::Strong.is_strong());
        assert!(!EntropyTier::Fallback.is_strong());
        assert_eq!(EntropyTier::Fallback.to_string(), "fallback");
    }

    #[test]
    fn test_post_quantum_families() {
        let pq: Vec<_> = Algorithm::ALL.iter().filter(|a| a.is_post_quantum()).collect();
        assert_eq!(pq.len(), 4);
        assert!(!Algorithm::ChaCha20Poly1305.is_post_quantum());
    }

    #[test]
    fn test_security_level_ordering() {
        assert!(SecurityLevel::Level5 > SecurityLevel::Level3);
        assert_eq!(SecurityLevel::Level3.classical_bits(), 192);
        assert_eq!(SecurityLevel::Level5.category(), 5);
    }
}
