//! Cryptographic error types
//!
//! Malformed inputs are errors. Failed authentication is not: AEAD and
//! signature checks report `None`/`false` and never say why.

use thiserror::Error;

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors in cryptographic operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key has the wrong number of bytes for the algorithm
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Nonce has the wrong number of bytes for the algorithm
    #[error("Invalid nonce length: expected {expected} bytes, got {actual}")]
    InvalidNonceLength { expected: usize, actual: usize },

    /// Parameter outside its allowed range (hash output size, key size, ranges)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed or undersized input buffer (ciphertext, header)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialized key does not match the expected layout
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Signature buffer too short to be parsed
    #[error("Invalid signature data: expected at least {expected} bytes, got {actual}")]
    InvalidSignatureData { expected: usize, actual: usize },

    /// Decryption could not recover a plausible plaintext
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// The random generator was destroyed and can no longer produce output
    #[error("Random generator has been destroyed")]
    Destroyed,

    /// Random number generation failed
    #[error("RNG failed: {0}")]
    RngFailed(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CryptoError {
    /// Shorthand for a key length mismatch
    pub fn key_length(expected: usize, actual: usize) -> Self {
        Self::InvalidKeyLength { expected, actual }
    }

    /// Shorthand for a nonce length mismatch
    pub fn nonce_length(expected: usize, actual: usize) -> Self {
        Self::InvalidNonceLength { expected, actual }
    }
}
