//! # QSafe Random
//!
//! Randomness for the QSafe toolkit:
//! - `Csprng` - thread-safe generator with seed mixing and periodic reseeding
//! - `EntropyCollector` - bounded pool of timing, event and caller entropy
//!
//! The generator reports which entropy tier it runs on. The fallback tier
//! is best effort and is never suitable for long-lived key material.

pub mod csprng;
pub mod entropy;

pub use csprng::{Csprng, EntropyQuality, ALPHANUMERIC, MAX_REJECTION_ATTEMPTS};
pub use entropy::{EntropyCollector, EntropySource, EventKind};

/// Prelude for common imports
pub mod prelude {
    pub use crate::csprng::{Csprng, EntropyQuality};
    pub use crate::entropy::{EntropyCollector, EventKind};
    pub use qsafe_core::{CryptoError, CsprngConfig, EntropyTier, Result};
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn random_int_stays_in_range(min in -1_000_000i64..1_000_000, span in 1i64..100_000) {
            let (rng, _) = Csprng::with_defaults().unwrap();
            let max = min + span;
            let v = rng.random_int(min, max).unwrap();
            prop_assert!(v >= min && v < max);
        }

        #[test]
        fn random_bytes_has_requested_length(len in 0usize..512) {
            let (rng, _) = Csprng::with_defaults().unwrap();
            prop_assert_eq!(rng.random_bytes(len).unwrap().len(), len);
        }
    }
}
