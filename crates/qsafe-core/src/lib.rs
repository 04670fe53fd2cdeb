//! # QSafe Core
//!
//! Shared building blocks for the QSafe cryptography toolkit:
//! - `CryptoError` - the error taxonomy every primitive reports through
//! - Algorithm constants, entropy tiers and security levels
//! - `QSafeConfig` - TOML configuration for generators and parameter sets

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;
