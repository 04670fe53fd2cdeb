//! Cryptographically secure random generator
//!
//! Output is drawn from the operating system generator when one is usable,
//! otherwise from a ChaCha20 stream keyed with a time and counter mix. The
//! weaker path is never silent: the tier is returned from [`Csprng::new`]
//! and reported by [`Csprng::entropy_quality`].
//!
//! Every call to [`Csprng::random_bytes`] XORs the platform bytes with the
//! internal seed and a counter-derived byte, then advances the counter. Once
//! the counter has moved more than `reseed_interval` calls past the last
//! reseed, the seed is refreshed from the platform source and the entropy
//! pool.

use std::collections::HashSet;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use qsafe_core::{CryptoError, CsprngConfig, EntropySourceKind, EntropyTier, Result};

use crate::entropy::EntropyCollector;

/// Rejection sampling attempts before the folding fallback in `random_int`
pub const MAX_REJECTION_ATTEMPTS: u32 = 128;

/// Default alphabet for `random_string`
pub const ALPHANUMERIC: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Snapshot of the generator's entropy situation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntropyQuality {
    /// Source tier in use
    pub tier: EntropyTier,
    /// Source kind that was requested
    pub requested: EntropySourceKind,
    /// Samples waiting in the entropy pool
    pub pooled_samples: usize,
    /// Generation calls so far
    pub counter: u64,
    /// Completed reseeds, automatic and explicit
    pub reseed_count: u64,
    /// Whether `destroy` has been called
    pub destroyed: bool,
}

enum PlatformSource {
    Os,
    Fallback(ChaCha20Rng),
}

struct CsprngState {
    seed: Zeroizing<Vec<u8>>,
    counter: u64,
    last_reseed: u64,
    reseed_count: u64,
    source: PlatformSource,
    collector: EntropyCollector,
    origin: Instant,
    destroyed: bool,
}

/// Thread-safe CSPRNG
///
/// Access is serialized by an internal mutex so that reading and advancing
/// the seed and counter is one step.
pub struct Csprng {
    state: Mutex<CsprngState>,
    config: CsprngConfig,
    tier: EntropyTier,
}

impl Csprng {
    /// Create a generator, degrading to the fallback tier when no operating
    /// system source is usable
    pub fn new(config: CsprngConfig) -> Result<(Self, EntropyTier)> {
        config.validate()?;

        let origin = Instant::now();
        let mut collector = EntropyCollector::new();
        collector.sample_timing();

        let use_os = match config.entropy_source {
            EntropySourceKind::Fallback => false,
            EntropySourceKind::Auto | EntropySourceKind::Os => os_source_available(),
        };

        let (source, tier) = if use_os {
            (PlatformSource::Os, EntropyTier::Strong)
        } else {
            if config.entropy_source != EntropySourceKind::Fallback {
                tracing::warn!(
                    "operating system entropy unavailable, using best-effort fallback; output is not suitable for key material"
                );
            }
            let key = fallback_key(&collector.digest(), &[], origin);
            (PlatformSource::Fallback(ChaCha20Rng::from_seed(key)), EntropyTier::Fallback)
        };

        let mut state = CsprngState {
            seed: Zeroizing::new(vec![0u8; config.seed_length]),
            counter: 0,
            last_reseed: 0,
            reseed_count: 0,
            source,
            collector,
            origin,
            destroyed: false,
        };

        let mut initial = Zeroizing::new(vec![0u8; config.seed_length]);
        state.fill_platform(&mut initial)?;
        let pool = state.collector.take_digest();
        for (i, byte) in initial.iter().enumerate() {
            state.seed[i] = byte ^ pool[i % pool.len()];
        }

        tracing::debug!(%tier, seed_length = config.seed_length, "csprng initialized");

        Ok((
            Self {
                state: Mutex::new(state),
                config,
                tier,
            },
            tier,
        ))
    }

    /// Generator with default configuration
    pub fn with_defaults() -> Result<(Self, EntropyTier)> {
        Self::new(CsprngConfig::default())
    }

    pub fn config(&self) -> &CsprngConfig {
        &self.config
    }

    pub fn tier(&self) -> EntropyTier {
        self.tier
    }

    /// Current entropy situation
    pub fn entropy_quality(&self) -> EntropyQuality {
        let state = self.state.lock();
        EntropyQuality {
            tier: self.tier,
            requested: self.config.entropy_source,
            pooled_samples: state.collector.sample_count(),
            counter: state.counter,
            reseed_count: state.reseed_count,
            destroyed: state.destroyed,
        }
    }

    /// Access to the owned entropy collector for host ticks and events
    pub fn collector(&self) -> MappedMutexGuard<'_, EntropyCollector> {
        MutexGuard::map(self.state.lock(), |state| &mut state.collector)
    }

    /// Fill `buf` with random bytes
    pub fn fill_bytes(&self, buf: &mut [u8]) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_alive()?;
        state.fill_platform(buf)?;

        let counter_byte = state.counter.to_le_bytes().iter().fold(0u8, |acc, b| acc ^ b);
        let seed_len = state.seed.len();
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte ^= state.seed[i % seed_len] ^ counter_byte;
        }

        state.counter = state.counter.wrapping_add(1);
        if state.counter.wrapping_sub(state.last_reseed) > self.config.reseed_interval {
            tracing::trace!(counter = state.counter, "automatic reseed");
            state.reseed(None)?;
        }
        Ok(())
    }

    /// `len` random bytes
    pub fn random_bytes(&self, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.fill_bytes(&mut out)?;
        Ok(out)
    }

    /// Fixed-size random array
    pub fn random_array<const N: usize>(&self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.fill_bytes(&mut out)?;
        Ok(out)
    }

    pub fn random_u32(&self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.random_array()?))
    }

    pub fn random_u64(&self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.random_array()?))
    }

    /// Uniform integer in `[min, max)`
    ///
    /// Rejection sampling over the fewest bytes covering the range. After
    /// [`MAX_REJECTION_ATTEMPTS`] misses a fold of four fresh bytes is
    /// reduced modulo the range so the call always terminates.
    pub fn random_int(&self, min: i64, max: i64) -> Result<i64> {
        if min >= max {
            return Err(CryptoError::InvalidParameter(format!(
                "empty range [{}, {})",
                min, max
            )));
        }

        let range = (max as i128 - min as i128) as u128;
        let bits = 128 - (range - 1).leading_zeros();
        let bytes_needed = bits.div_ceil(8).max(1) as usize;
        let space = 1u128 << (8 * bytes_needed);
        let limit = space - space % range;

        let mut buf = [0u8; 8];
        for _ in 0..MAX_REJECTION_ATTEMPTS {
            buf.fill(0);
            self.fill_bytes(&mut buf[..bytes_needed])?;
            let value = u64::from_le_bytes(buf) as u128;
            if value < limit {
                return Ok((min as i128 + (value % range) as i128) as i64);
            }
        }

        tracing::warn!(min, max, "rejection sampling exhausted, folding fresh bytes");
        let fresh: [u8; 4] = self.random_array()?;
        let folded = fresh.iter().fold(0u32, |acc, &b| acc.rotate_left(8) ^ b as u32);
        Ok((min as i128 + (folded as u128 % range) as i128) as i64)
    }

    /// Uniform float in `[0, 1)` with 53 bits of precision
    pub fn random_float(&self) -> Result<f64> {
        let bits = self.random_u64()? >> 11;
        Ok(bits as f64 / (1u64 << 53) as f64)
    }

    /// Random string drawn from `charset` (alphanumeric when `None`)
    pub fn random_string(&self, len: usize, charset: Option<&str>) -> Result<String> {
        let chars: Vec<char> = charset.unwrap_or(ALPHANUMERIC).chars().collect();
        if chars.is_empty() {
            return Err(CryptoError::InvalidParameter("empty charset".to_string()));
        }
        (0..len)
            .map(|_| {
                self.random_int(0, chars.len() as i64)
                    .map(|idx| chars[idx as usize])
            })
            .collect()
    }

    /// Hex encoding of `byte_len` random bytes
    pub fn random_hex(&self, byte_len: usize) -> Result<String> {
        Ok(hex::encode(self.random_bytes(byte_len)?))
    }

    /// Standard base64 encoding of `byte_len` random bytes
    pub fn random_base64(&self, byte_len: usize) -> Result<String> {
        Ok(STANDARD.encode(self.random_bytes(byte_len)?))
    }

    /// URL-safe unpadded token from `byte_len` random bytes
    pub fn random_token(&self, byte_len: usize) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.random_bytes(byte_len)?))
    }

    /// Version 4 UUID (RFC 4122 §4.4)
    pub fn random_uuid(&self) -> Result<Uuid> {
        let mut bytes: [u8; 16] = self.random_array()?;
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        Ok(Uuid::from_bytes(bytes))
    }

    /// Fisher–Yates shuffle
    pub fn shuffle<T>(&self, items: &mut [T]) -> Result<()> {
        for i in (1..items.len()).rev() {
            let j = self.random_int(0, i as i64 + 1)? as usize;
            items.swap(i, j);
        }
        Ok(())
    }

    /// Uniformly chosen element, `None` for an empty slice
    pub fn choice<'a, T>(&self, items: &'a [T]) -> Result<Option<&'a T>> {
        if items.is_empty() {
            return Ok(None);
        }
        let idx = self.random_int(0, items.len() as i64)? as usize;
        Ok(items.get(idx))
    }

    /// `k` elements at distinct positions
    pub fn sample<T: Clone>(&self, items: &[T], k: usize) -> Result<Vec<T>> {
        if k > items.len() {
            return Err(CryptoError::InvalidParameter(format!(
                "cannot sample {} of {} elements",
                k,
                items.len()
            )));
        }

        let mut chosen = HashSet::with_capacity(k);
        let mut out = Vec::with_capacity(k);
        while out.len() < k {
            let idx = self.random_int(0, items.len() as i64)? as usize;
            if chosen.insert(idx) {
                out.push(items[idx].clone());
            }
        }
        Ok(out)
    }

    /// Refresh the seed from the platform source, the entropy pool and
    /// optional caller bytes
    pub fn reseed(&self, extra: Option<&[u8]>) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_alive()?;
        state.reseed(extra)
    }

    /// Queue caller entropy for the next reseed
    pub fn add_entropy(&self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_alive()?;
        state.collector.add_entropy(data);
        Ok(())
    }

    /// Zero the seed. Every later generation call fails with `Destroyed`.
    pub fn destroy(&self) {
        let mut state = self.state.lock();
        state.seed.zeroize();
        state.collector.clear();
        if let PlatformSource::Fallback(_) = state.source {
            state.source = PlatformSource::Fallback(ChaCha20Rng::from_seed([0u8; 32]));
        }
        state.destroyed = true;
        tracing::debug!("csprng destroyed");
    }
}

impl std::fmt::Debug for Csprng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the seed
        f.debug_struct("Csprng")
            .field("tier", &self.tier)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CsprngState {
    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            Err(CryptoError::Destroyed)
        } else {
            Ok(())
        }
    }

    fn fill_platform(&mut self, buf: &mut [u8]) -> Result<()> {
        match &mut self.source {
            PlatformSource::Os => OsRng
                .try_fill_bytes(buf)
                .map_err(|e| CryptoError::RngFailed(e.to_string())),
            PlatformSource::Fallback(rng) => {
                rng.fill_bytes(buf);
                Ok(())
            }
        }
    }

    fn reseed(&mut self, extra: Option<&[u8]>) -> Result<()> {
        let seed_len = self.seed.len();
        let mut fresh = Zeroizing::new(vec![0u8; seed_len]);
        self.fill_platform(&mut fresh)?;

        self.collector.sample_timing();
        let pool = self.collector.take_digest();
        let counter = self.counter.to_le_bytes();

        let mut next = Zeroizing::new(vec![0u8; seed_len]);
        for i in 0..seed_len {
            next[i] = self.seed[(i + 1) % seed_len].rotate_left(3)
                ^ fresh[i]
                ^ pool[i % pool.len()]
                ^ counter[i % counter.len()];
        }
        if let Some(extra) = extra {
            for (i, byte) in extra.iter().enumerate() {
                next[i % seed_len] ^= byte.rotate_left(((i / seed_len) % 8) as u32);
            }
        }

        if let PlatformSource::Fallback(_) = self.source {
            let key = fallback_key(&pool, &next, self.origin);
            self.source = PlatformSource::Fallback(ChaCha20Rng::from_seed(key));
        }

        self.seed = next;
        self.last_reseed = self.counter;
        self.reseed_count += 1;
        Ok(())
    }
}

fn os_source_available() -> bool {
    let mut probe = [0u8; 32];
    match OsRng.try_fill_bytes(&mut probe) {
        Ok(()) => probe.iter().any(|&b| b != 0),
        Err(e) => {
            tracing::debug!(error = %e, "operating system entropy probe failed");
            false
        }
    }
}

/// Key the fallback stream from clocks, a stack address, the entropy pool
/// and the current seed. Best effort only.
fn fallback_key(pool: &[u8; 32], seed: &[u8], origin: Instant) -> [u8; 32] {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let mono = origin.elapsed().as_nanos() as u64;
    let marker = 0u8;
    let stack = &marker as *const u8 as u64;

    let lanes = [
        splitmix64(wall),
        splitmix64(mono ^ 0x5851_f42d_4c95_7f2d),
        splitmix64(stack ^ wall.rotate_left(17)),
        splitmix64(wall ^ mono.rotate_left(29) ^ std::process::id() as u64),
    ];

    let mut key = [0u8; 32];
    for (chunk, lane) in key.chunks_exact_mut(8).zip(lanes.iter()) {
        chunk.copy_from_slice(&lane.to_le_bytes());
    }
    for (i, byte) in key.iter_mut().enumerate() {
        *byte ^= pool[i];
        if !seed.is_empty() {
            *byte ^= seed[i % seed.len()];
        }
    }
    key
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
