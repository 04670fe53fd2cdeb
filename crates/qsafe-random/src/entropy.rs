//! Auxiliary entropy collection
//!
//! Samples are 32-bit values mixed on arrival and kept in one bounded ring
//! buffer per source. There is no internal timer: the host calls
//! [`EntropyCollector::tick`] on its own schedule while collection is on.

use std::collections::VecDeque;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use qsafe_core::constants::MAX_SAMPLES_PER_SOURCE;

/// Origin of a pooled sample
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntropySource {
    /// High-resolution timing jitter
    Timing,
    /// Caller supplied bytes
    External,
    /// Host-reported UI events
    Event,
}

impl EntropySource {
    fn tag(&self) -> u32 {
        match self {
            Self::Timing => 0x7469_6d65,
            Self::External => 0x6578_746e,
            Self::Event => 0x6576_6e74,
        }
    }
}

/// Kind of host-reported UI event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Pointer,
    Keyboard,
}

/// Entropy pool fed by timing, external add-ins and UI events
#[derive(Debug)]
pub struct EntropyCollector {
    timing: VecDeque<u32>,
    external: VecDeque<u32>,
    events: VecDeque<u32>,
    collecting: bool,
    origin: Instant,
    last_tick: Instant,
    mix: u32,
}

impl EntropyCollector {
    /// Create an empty, stopped collector
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            timing: VecDeque::with_capacity(MAX_SAMPLES_PER_SOURCE),
            external: VecDeque::with_capacity(MAX_SAMPLES_PER_SOURCE),
            events: VecDeque::with_capacity(MAX_SAMPLES_PER_SOURCE),
            collecting: false,
            origin: now,
            last_tick: now,
            mix: 0x6a09_e667,
        }
    }

    pub fn start_collecting(&mut self) {
        if !self.collecting {
            tracing::debug!("entropy collection started");
        }
        self.collecting = true;
    }

    pub fn stop_collecting(&mut self) {
        if self.collecting {
            tracing::debug!(samples = self.sample_count(), "entropy collection stopped");
        }
        self.collecting = false;
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Take one timing sample. No-op unless collecting.
    pub fn tick(&mut self) -> bool {
        if !self.collecting {
            return false;
        }
        self.sample_timing();
        true
    }

    /// Take a timing sample regardless of the collecting flag
    pub(crate) fn sample_timing(&mut self) {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_nanos() as u64;
        self.last_tick = now;

        let raw = (delta as u32) ^ ((delta >> 32) as u32) ^ wall_clock_nanos().rotate_left(16);
        self.push(EntropySource::Timing, raw);
    }

    /// Record a pointer or keyboard event. Ignored unless collecting.
    pub fn record_event(&mut self, kind: EventKind, x: i32, y: i32) -> bool {
        if !self.collecting {
            return false;
        }
        let elapsed = self.origin.elapsed().as_nanos() as u32;
        let kind_bits = match kind {
            EventKind::Pointer => 0x5045_0000,
            EventKind::Keyboard => 0x4b42_0000,
        };
        let raw = (x as u32) ^ (y as u32).rotate_left(16) ^ elapsed ^ kind_bits;
        self.push(EntropySource::Event, raw);
        true
    }

    /// Fold caller supplied bytes into the external pool, 4 bytes per sample
    pub fn add_entropy(&mut self, data: &[u8]) {
        for chunk in data.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.push(EntropySource::External, u32::from_le_bytes(word));
        }
    }

    fn push(&mut self, source: EntropySource, raw: u32) {
        let mixed = raw ^ self.mix.rotate_left(13);
        self.mix = mixed.wrapping_mul(0x9e37_79b1).rotate_left(5) ^ source.tag();

        let pool = self.pool_mut(source);
        if pool.len() == MAX_SAMPLES_PER_SOURCE {
            pool.pop_front();
        }
        pool.push_back(mixed);
    }

    fn pool(&self, source: EntropySource) -> &VecDeque<u32> {
        match source {
            EntropySource::Timing => &self.timing,
            EntropySource::External => &self.external,
            EntropySource::Event => &self.events,
        }
    }

    fn pool_mut(&mut self, source: EntropySource) -> &mut VecDeque<u32> {
        match source {
            EntropySource::Timing => &mut self.timing,
            EntropySource::External => &mut self.external,
            EntropySource::Event => &mut self.events,
        }
    }

    /// Total pooled samples across all sources
    pub fn sample_count(&self) -> usize {
        self.timing.len() + self.external.len() + self.events.len()
    }

    pub fn sample_count_for(&self, source: EntropySource) -> usize {
        self.pool(source).len()
    }

    /// Fold every pooled sample into a 32-byte digest without consuming it
    pub fn digest(&self) -> [u8; 32] {
        let mut words = [0u32; 8];
        let mut index = 0usize;

        for source in [EntropySource::Timing, EntropySource::External, EntropySource::Event] {
            for &sample in self.pool(source) {
                let lane = index % 8;
                let rotation = ((index * 5) % 32) as u32;
                words[lane] ^= sample.rotate_left(rotation) ^ source.tag();
                words[(lane + 1) % 8] = words[(lane + 1) % 8].rotate_left(7) ^ words[lane];
                index += 1;
            }
        }
        words[0] ^= index as u32;

        let mut out = [0u8; 32];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Fold the pools into a digest and empty them
    pub fn take_digest(&mut self) -> [u8; 32] {
        let digest = self.digest();
        self.clear();
        digest
    }

    pub fn clear(&mut self) {
        self.timing.clear();
        self.external.clear();
        self.events.clear();
    }
}

impl Default for EntropyCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn wall_clock_nanos() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_requires_collecting() {
        let mut collector = EntropyCollector::new();
        assert!(!collector.tick());
        assert_eq!(collector.sample_count(), 0);

        collector.start_collecting();
        assert!(collector.tick());
        assert!(collector.tick());
        assert_eq!(collector.sample_count_for(EntropySource::Timing), 2);

        collector.stop_collecting();
        assert!(!collector.tick());
        assert_eq!(collector.sample_count(), 2);
    }

    #[test]
    fn test_events_ignored_when_stopped() {
        let mut collector = EntropyCollector::new();
        assert!(!collector.record_event(EventKind::Pointer, 10, 20));

        collector.start_collecting();
        assert!(collector.record_event(EventKind::Pointer, 10, 20));
        assert!(collector.record_event(EventKind::Keyboard, 65, 0));
        assert_eq!(collector.sample_count_for(EntropySource::Event), 2);
    }

    #[test]
    fn test_ring_buffer_is_bounded() {
        let mut collector = EntropyCollector::new();
        collector.add_entropy(&vec![7u8; MAX_SAMPLES_PER_SOURCE * 4 + 40]);
        assert_eq!(
            collector.sample_count_for(EntropySource::External),
            MAX_SAMPLES_PER_SOURCE
        );

        collector.start_collecting();
        for _ in 0..MAX_SAMPLES_PER_SOURCE + 10 {
            collector.tick();
        }
        assert_eq!(
            collector.sample_count_for(EntropySource::Timing),
            MAX_SAMPLES_PER_SOURCE
        );
    }

    #[test]
    fn test_add_entropy_partial_chunk() {
        let mut collector = EntropyCollector::new();
        collector.add_entropy(&[1, 2, 3, 4, 5]);
        assert_eq!(collector.sample_count_for(EntropySource::External), 2);
    }

    #[test]
    fn test_digest_depends_on_input() {
        let mut a = EntropyCollector::new();
        let mut b = EntropyCollector::new();
        a.add_entropy(b"alpha entropy");
        b.add_entropy(b"bravo entropy");

        assert_ne!(a.digest(), b.digest());
        // digest() does not consume
        assert_eq!(a.digest(), a.digest());
    }

    #[test]
    fn test_take_digest_consumes() {
        let mut collector = EntropyCollector::new();
        collector.add_entropy(b"some bytes");
        let before = collector.digest();

        let taken = collector.take_digest();
        assert_eq!(before, taken);
        assert_eq!(collector.sample_count(), 0);
    }
}
