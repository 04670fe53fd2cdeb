//! # QSafe Symmetric
//!
//! Modern symmetric primitives:
//! - `blake2b` - keyed/unkeyed BLAKE2b with 1 to 64 byte digests
//! - `chacha20` / `xsalsa20` - stream ciphers
//! - `poly1305` - one-time authenticator and constant-time tag comparison
//! - `aead` - ChaCha20-Poly1305
//!
//! All entry points validate key and nonce sizes against
//! `qsafe_core::constants` before doing any work.

pub mod aead;
pub mod blake2b;
pub mod chacha20;
pub mod poly1305;
pub mod xsalsa20;

pub use aead::ChaCha20Poly1305;
pub use blake2b::{blake2b, blake2b_256, blake2b_512, Blake2b};
pub use chacha20::ChaCha20;
pub use poly1305::Poly1305;
pub use xsalsa20::XSalsa20;

/// Constant-time byte comparison
pub use poly1305::verify as ct_eq;

/// Prelude for common imports
pub mod prelude {
    pub use crate::aead::{self, ChaCha20Poly1305};
    pub use crate::blake2b::{blake2b, Blake2b};
    pub use crate::chacha20::ChaCha20;
    pub use crate::poly1305::{self, Poly1305};
    pub use crate::xsalsa20::XSalsa20;
    pub use qsafe_core::{CryptoError, Result};
}
