//! # QSafe Post-Quantum Suite
//!
//! - `lwe` - Regev-style LWE public-key encryption
//! - `sphincs` - hash-based WOTS+ signatures over BLAKE2b
//! - `dilithium` - module-lattice Fiat-Shamir signatures (levels 2, 3, 5)
//! - `hybrid` - LWE + X25519 encryption, Dilithium + Ed25519 signatures
//! - `utils` - sizing tables, session-key encapsulation, timing harness
//!
//! ## Security Model
//!
//! | Function | Algorithm | Nominal Level |
//! |----------|-----------|---------------|
//! | Encryption | LWE (+ X25519 in hybrid) | NIST PQ-1 at n = 256 |
//! | Signatures | Dilithium (+ Ed25519 in hybrid) | NIST PQ-2 / 3 / 5 |
//! | Signatures | SPHINCS+ (WOTS+) | one-time, n-byte hashes |
//!
//! These are educational constructions; the parameter sets are not
//! interoperable with the standardized algorithms.

pub mod dilithium;
pub mod hybrid;
pub mod lwe;
pub mod sphincs;
pub mod utils;

pub use dilithium::{Dilithium, DilithiumKeyPair, DilithiumLevel};
pub use hybrid::{HybridCiphertext, HybridCrypto, HybridKeyPair, HybridPublicKey, HybridSecretKey, HybridSignature};
pub use lwe::{LweCrypto, LweKeyPair, LweParams, LwePrivateKey, LwePublicKey};
pub use sphincs::{SphincsKeyPair, SphincsParams, SphincsPlus, SphincsSignature};
pub use utils::{BenchmarkReport, KeySizes, QuantumSafeUtils};

/// Prelude for common imports
pub mod prelude {
    pub use crate::dilithium::{Dilithium, DilithiumLevel};
    pub use crate::hybrid::{HybridCrypto, HybridPublicKey, HybridSecretKey, HybridSignature};
    pub use crate::lwe::{LweCrypto, LweParams};
    pub use crate::sphincs::{SphincsParams, SphincsPlus};
    pub use crate::utils::QuantumSafeUtils;
    pub use qsafe_core::{Algorithm, CryptoError, Result, SecurityLevel};
}
