//! Toolkit configuration types
//!
//! Every section falls back to its defaults, so an empty TOML document is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CryptoError, Result};
use crate::types::constants::{DEFAULT_RESEED_INTERVAL, DEFAULT_SEED_LENGTH};
use crate::types::EntropySourceKind;

/// Complete toolkit configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QSafeConfig {
    /// Random generator settings
    #[serde(default)]
    pub csprng: CsprngConfig,

    /// LWE lattice parameters
    #[serde(default)]
    pub lwe: LweConfig,

    /// SPHINCS+ parameters
    #[serde(default)]
    pub sphincs: SphincsConfig,

    /// Dilithium parameters
    #[serde(default)]
    pub dilithium: DilithiumConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl QSafeConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| CryptoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CryptoError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CryptoError::Config(e.to_string()))
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.csprng.validate()?;
        self.lwe.validate()?;
        self.sphincs.validate()?;
        self.dilithium.validate()?;
        Ok(())
    }
}

/// CSPRNG configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsprngConfig {
    /// Requested entropy source
    #[serde(default)]
    pub entropy_source: EntropySourceKind,

    /// Internal seed length in bytes (16-64)
    #[serde(default = "default_seed_length")]
    pub seed_length: usize,

    /// Number of generation calls between automatic reseeds
    #[serde(default = "default_reseed_interval")]
    pub reseed_interval: u64,
}

fn default_seed_length() -> usize {
    DEFAULT_SEED_LENGTH
}

fn default_reseed_interval() -> u64 {
    DEFAULT_RESEED_INTERVAL
}

impl Default for CsprngConfig {
    fn default() -> Self {
        Self {
            entropy_source: EntropySourceKind::default(),
            seed_length: default_seed_length(),
            reseed_interval: default_reseed_interval(),
        }
    }
}

impl CsprngConfig {
    pub fn validate(&self) -> Result<()> {
        if !(16..=64).contains(&self.seed_length) {
            return Err(CryptoError::InvalidParameter(format!(
                "seed length must be between 16 and 64 bytes, got {}",
                self.seed_length
            )));
        }
        if self.reseed_interval == 0 {
            return Err(CryptoError::InvalidParameter(
                "reseed interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// LWE configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LweConfig {
    /// Lattice dimension
    #[serde(default = "default_lwe_n")]
    pub n: usize,

    /// Modulus (power of two)
    #[serde(default = "default_lwe_q")]
    pub q: u32,

    /// Gaussian noise width
    #[serde(default = "default_lwe_sigma")]
    pub sigma: f64,

    /// Largest accepted distance from a decoding candidate; `None` means 3q/16
    #[serde(default)]
    pub reject_margin: Option<u32>,
}

fn default_lwe_n() -> usize {
    256
}

fn default_lwe_q() -> u32 {
    4096
}

fn default_lwe_sigma() -> f64 {
    3.2
}

impl Default for LweConfig {
    fn default() -> Self {
        Self {
            n: default_lwe_n(),
            q: default_lwe_q(),
            sigma: default_lwe_sigma(),
            reject_margin: None,
        }
    }
}

impl LweConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n < 8 {
            return Err(CryptoError::InvalidParameter(format!(
                "LWE dimension must be at least 8, got {}",
                self.n
            )));
        }
        if !self.q.is_power_of_two() || !(256..=1 << 24).contains(&self.q) {
            return Err(CryptoError::InvalidParameter(format!(
                "LWE modulus must be a power of two in [256, 2^24], got {}",
                self.q
            )));
        }
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err(CryptoError::InvalidParameter(format!(
                "LWE sigma must be positive, got {}",
                self.sigma
            )));
        }
        if let Some(margin) = self.reject_margin {
            if margin == 0 || margin >= self.q / 4 {
                return Err(CryptoError::InvalidParameter(format!(
                    "LWE reject margin must be in (0, q/4), got {}",
                    margin
                )));
            }
        }
        Ok(())
    }
}

/// SPHINCS+ configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SphincsConfig {
    /// Hash output bytes
    #[serde(default = "default_sphincs_n")]
    pub n: usize,

    /// Winternitz base
    #[serde(default = "default_sphincs_w")]
    pub w: u32,

    /// Tree height
    #[serde(default = "default_sphincs_h")]
    pub h: u32,
}

fn default_sphincs_n() -> usize {
    32
}

fn default_sphincs_w() -> u32 {
    16
}

fn default_sphincs_h() -> u32 {
    8
}

impl Default for SphincsConfig {
    fn default() -> Self {
        Self {
            n: default_sphincs_n(),
            w: default_sphincs_w(),
            h: default_sphincs_h(),
        }
    }
}

impl SphincsConfig {
    pub fn validate(&self) -> Result<()> {
        if !(16..=64).contains(&self.n) {
            return Err(CryptoError::InvalidParameter(format!(
                "SPHINCS+ n must be between 16 and 64, got {}",
                self.n
            )));
        }
        if !matches!(self.w, 4 | 16 | 256) {
            return Err(CryptoError::InvalidParameter(format!(
                "SPHINCS+ w must be 4, 16 or 256, got {}",
                self.w
            )));
        }
        if self.h == 0 || self.h > 64 {
            return Err(CryptoError::InvalidParameter(format!(
                "SPHINCS+ h must be between 1 and 64, got {}",
                self.h
            )));
        }
        Ok(())
    }
}

/// Dilithium configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DilithiumConfig {
    /// Nominal security level (2, 3 or 5)
    #[serde(default = "default_dilithium_level")]
    pub level: u8,
}

fn default_dilithium_level() -> u8 {
    3
}

impl Default for DilithiumConfig {
    fn default() -> Self {
        Self {
            level: default_dilithium_level(),
        }
    }
}

impl DilithiumConfig {
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.level, 2 | 3 | 5) {
            return Err(CryptoError::InvalidParameter(format!(
                "Dilithium level must be 2, 3 or 5, got {}",
                self.level
            )));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
