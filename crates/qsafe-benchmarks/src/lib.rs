//! # QSafe Performance Benchmarks
//!
//! Latency measurements for every primitive family, checked against
//! fixed budgets.
//!
//! | Operation | Budget (p99) | Function |
//! |-----------|--------------|----------|
//! | CSPRNG 1 KiB | < 1ms | `random::bench_random_bytes` |
//! | ChaCha20-Poly1305 seal 4 KiB | < 1ms | `symmetric::bench_aead_seal` |
//! | BLAKE2b 4 KiB | < 1ms | `symmetric::bench_blake2b` |
//! | LWE encrypt 32 B (n = 256) | < 250ms | `pq::bench_lwe_encrypt` |
//! | SPHINCS+ sign | < 50ms | `pq::bench_sphincs_sign` |
//! | Dilithium sign | < 100ms | `pq::bench_dilithium_sign` |
//! | Hybrid encrypt 32 B | < 300ms | `pq::bench_hybrid_encrypt` |
//!
//! ## Usage
//!
//! ```bash
//! # Criterion suites
//! cargo bench --package qsafe-benchmarks
//!
//! # One suite
//! cargo bench --package qsafe-benchmarks --bench pq_benchmarks
//! ```

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use qsafe_core::Result;

// ============================================================================
// LATENCY BUDGETS
// ============================================================================

/// p99 latency budgets, in microseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyBudgets {
    pub random_1k_us: u64,
    pub aead_seal_4k_us: u64,
    pub blake2b_4k_us: u64,
    pub lwe_encrypt_us: u64,
    pub sphincs_sign_us: u64,
    pub dilithium_sign_us: u64,
    pub hybrid_encrypt_us: u64,
}

impl Default for LatencyBudgets {
    fn default() -> Self {
        Self {
            random_1k_us: 1_000,
            aead_seal_4k_us: 1_000,
            blake2b_4k_us: 1_000,
            lwe_encrypt_us: 250_000,
            sphincs_sign_us: 50_000,
            dilithium_sign_us: 100_000,
            hybrid_encrypt_us: 300_000,
        }
    }
}

// ============================================================================
// BENCHMARK RESULTS
// ============================================================================

/// Result of a single benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub iterations: u64,

    /// Total time (ns)
    pub total_time_ns: u64,
    pub mean_ns: f64,
    pub std_dev_ns: f64,
    pub median_ns: f64,
    pub p99_ns: f64,

    /// Operations per second
    pub throughput: f64,

    /// p99 within the budget (always true without one)
    pub within_budget: bool,
    pub budget_ns: Option<u64>,
}

impl BenchmarkResult {
    /// Statistics over per-iteration timings
    pub fn from_timings(name: &str, timings: &[u64], budget_ns: Option<u64>) -> Self {
        let iterations = timings.len() as u64;
        if iterations == 0 {
            return Self {
                name: name.to_string(),
                iterations: 0,
                total_time_ns: 0,
                mean_ns: 0.0,
                std_dev_ns: 0.0,
                median_ns: 0.0,
                p99_ns: 0.0,
                throughput: 0.0,
                within_budget: true,
                budget_ns,
            };
        }

        let total_time_ns: u64 = timings.iter().sum();
        let mean_ns = total_time_ns as f64 / iterations as f64;

        let variance: f64 = timings
            .iter()
            .map(|&t| {
                let diff = t as f64 - mean_ns;
                diff * diff
            })
            .sum::<f64>()
            / iterations as f64;
        let std_dev_ns = variance.sqrt();

        let mut sorted = timings.to_vec();
        sorted.sort_unstable();

        let mid = sorted.len() / 2;
        let median_ns = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
        } else {
            sorted[mid] as f64
        };

        let p99_idx = ((iterations as f64 * 0.99) as usize).min(sorted.len() - 1);
        let p99_ns = sorted[p99_idx] as f64;

        let throughput = if mean_ns > 0.0 { 1_000_000_000.0 / mean_ns } else { f64::INFINITY };
        let within_budget = budget_ns.map(|b| p99_ns <= b as f64).unwrap_or(true);

        Self {
            name: name.to_string(),
            iterations,
            total_time_ns,
            mean_ns,
            std_dev_ns,
            median_ns,
            p99_ns,
            throughput,
            within_budget,
            budget_ns,
        }
    }

    pub fn print_summary(&self) {
        let status = if self.within_budget { "PASS" } else { "FAIL" };

        println!("\n{} - {}", self.name, status);
        println!("  Iterations:  {}", self.iterations);
        println!("  Mean:        {:.2}µs", self.mean_ns / 1000.0);
        println!("  Std Dev:     {:.2}µs", self.std_dev_ns / 1000.0);
        println!("  Median:      {:.2}µs", self.median_ns / 1000.0);
        println!("  p99:         {:.2}µs", self.p99_ns / 1000.0);
        println!("  Throughput:  {:.2} ops/sec", self.throughput);
        if let Some(budget) = self.budget_ns {
            println!("  Budget:      {:.2}µs", budget as f64 / 1000.0);
        }
    }
}

/// Full benchmark report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    pub system_info: SystemInfo,
    pub results: Vec<BenchmarkResult>,
    pub all_within_budget: bool,
    pub budgets: LatencyBudgets,
}

impl BenchmarkReport {
    pub fn new() -> Self {
        Self {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            system_info: SystemInfo::collect(),
            results: Vec::new(),
            all_within_budget: true,
            budgets: LatencyBudgets::default(),
        }
    }

    pub fn add_result(&mut self, result: BenchmarkResult) {
        if !result.within_budget {
            self.all_within_budget = false;
        }
        self.results.push(result);
    }

    pub fn print_report(&self) {
        println!("\nQSafe performance report");
        println!("  {} / {} / {} cores", self.system_info.os, self.system_info.arch, self.system_info.cpu_cores);
        for result in &self.results {
            result.print_summary();
        }
        let passed = self.results.iter().filter(|r| r.within_budget).count();
        println!("\n{}/{} within budget", passed, self.results.len());
    }

    pub fn save_json(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}

impl Default for BenchmarkReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Host information recorded with a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpu_cores: usize,
}

impl SystemInfo {
    pub fn collect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_cores: std::thread::available_parallelism().map(|p| p.get()).unwrap_or(1),
        }
    }
}

// ============================================================================
// BENCHMARK UTILITIES
// ============================================================================

/// Run `f` `warmup` times untimed, then `iterations` times timed
pub fn run_benchmark<F>(
    name: &str,
    iterations: usize,
    warmup: usize,
    budget_ns: Option<u64>,
    mut f: F,
) -> Result<BenchmarkResult>
where
    F: FnMut() -> Result<()>,
{
    for _ in 0..warmup {
        f()?;
    }

    let mut timings = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        f()?;
        timings.push(start.elapsed().as_nanos() as u64);
    }

    tracing::debug!(name, iterations, "benchmark complete");
    Ok(BenchmarkResult::from_timings(name, &timings, budget_ns))
}

fn micros(us: u64) -> Option<u64> {
    Some(us * 1_000)
}

// ============================================================================
// RANDOM BENCHMARKS
// ============================================================================

pub mod random {
    use super::*;
    use qsafe_random::Csprng;

    pub fn bench_random_bytes(iterations: usize) -> Result<BenchmarkResult> {
        let budgets = LatencyBudgets::default();
        let (rng, _) = Csprng::with_defaults()?;
        let mut buf = [0u8; 1024];

        run_benchmark("CSPRNG 1 KiB", iterations, 10, micros(budgets.random_1k_us), || {
            rng.fill_bytes(&mut buf)
        })
    }
}

// ============================================================================
// SYMMETRIC BENCHMARKS
// ============================================================================

pub mod symmetric {
    use super::*;
    use qsafe_symmetric::{blake2b, ChaCha20Poly1305};

    pub fn bench_aead_seal(iterations: usize) -> Result<BenchmarkResult> {
        let budgets = LatencyBudgets::default();
        let aead = ChaCha20Poly1305::new(&[7u8; 32])?;
        let data = vec![0u8; 4096];

        run_benchmark(
            "ChaCha20-Poly1305 seal 4 KiB",
            iterations,
            10,
            micros(budgets.aead_seal_4k_us),
            || aead.seal(&[1u8; 12], &data, b"").map(drop),
        )
    }

    pub fn bench_blake2b(iterations: usize) -> Result<BenchmarkResult> {
        let budgets = LatencyBudgets::default();
        let data = vec![0u8; 4096];

        run_benchmark("BLAKE2b-512 4 KiB", iterations, 10, micros(budgets.blake2b_4k_us), || {
            blake2b(&data, 64, None).map(drop)
        })
    }
}

// ============================================================================
// POST-QUANTUM BENCHMARKS
// ============================================================================

pub mod pq {
    use super::*;
    use qsafe_pq::{Dilithium, DilithiumLevel, HybridCrypto, LweCrypto, LweParams, SphincsParams, SphincsPlus};
    use qsafe_random::Csprng;

    pub fn bench_lwe_encrypt(iterations: usize) -> Result<BenchmarkResult> {
        let budgets = LatencyBudgets::default();
        let (rng, _) = Csprng::with_defaults()?;
        let lwe = LweCrypto::new(LweParams::default())?;
        let keys = lwe.generate_key_pair(&rng)?;
        let message = [0x5au8; 32];

        run_benchmark("LWE encrypt 32 B", iterations, 1, micros(budgets.lwe_encrypt_us), || {
            lwe.encrypt(&message, &keys.public, &rng).map(drop)
        })
    }

    pub fn bench_sphincs_sign(iterations: usize) -> Result<BenchmarkResult> {
        let budgets = LatencyBudgets::default();
        let (rng, _) = Csprng::with_defaults()?;
        let sphincs = SphincsPlus::new(SphincsParams::default())?;
        let keys = sphincs.generate_key_pair(&rng)?;

        run_benchmark("SPHINCS+ sign", iterations, 2, micros(budgets.sphincs_sign_us), || {
            sphincs.sign(b"benchmark message", &keys.private_key).map(drop)
        })
    }

    pub fn bench_dilithium_sign(iterations: usize, level: DilithiumLevel) -> Result<BenchmarkResult> {
        let budgets = LatencyBudgets::default();
        let (rng, _) = Csprng::with_defaults()?;
        let dilithium = Dilithium::new(level);
        let keys = dilithium.generate_key_pair(&rng)?;

        run_benchmark(
            &format!("{} sign", level),
            iterations,
            2,
            micros(budgets.dilithium_sign_us),
            || dilithium.sign(b"benchmark message", &keys.private_key, &rng).map(drop),
        )
    }

    pub fn bench_hybrid_encrypt(iterations: usize) -> Result<BenchmarkResult> {
        let budgets = LatencyBudgets::default();
        let (rng, _) = Csprng::with_defaults()?;
        let hybrid = HybridCrypto::new(LweParams::default(), DilithiumLevel::Three)?;
        let keys = hybrid.generate_key_pair(&rng)?;
        let message = [0x5au8; 32];

        run_benchmark("Hybrid encrypt 32 B", iterations, 1, micros(budgets.hybrid_encrypt_us), || {
            hybrid.encrypt(&message, &keys.public, &rng).map(drop)
        })
    }
}

// ============================================================================
// FULL SUITE
// ============================================================================

/// Run every latency benchmark and print the report
pub fn run_full_benchmark_suite() -> Result<BenchmarkReport> {
    let mut report = BenchmarkReport::new();

    report.add_result(random::bench_random_bytes(1000)?);
    report.add_result(symmetric::bench_aead_seal(1000)?);
    report.add_result(symmetric::bench_blake2b(1000)?);
    report.add_result(pq::bench_lwe_encrypt(10)?);
    report.add_result(pq::bench_sphincs_sign(50)?);
    for level in qsafe_pq::DilithiumLevel::ALL {
        report.add_result(pq::bench_dilithium_sign(50, level)?);
    }
    report.add_result(pq::bench_hybrid_encrypt(10)?);

    report.print_report();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics() {
        let result = BenchmarkResult::from_timings("t", &[10, 20, 30, 40], Some(35));
        assert_eq!(result.iterations, 4);
        assert_eq!(result.total_time_ns, 100);
        assert_eq!(result.mean_ns, 25.0);
        assert_eq!(result.median_ns, 25.0);
        assert_eq!(result.p99_ns, 40.0);
        assert!(!result.within_budget);
    }

    #[test]
    fn test_empty_timings() {
        let result = BenchmarkResult::from_timings("empty", &[], None);
        assert_eq!(result.iterations, 0);
        assert!(result.within_budget);
    }

    #[test]
    fn test_report_tracks_budget_failures() {
        let mut report = BenchmarkReport::new();
        report.add_result(BenchmarkResult::from_timings("fast", &[1], Some(10)));
        assert!(report.all_within_budget);
        report.add_result(BenchmarkResult::from_timings("slow", &[100], Some(10)));
        assert!(!report.all_within_budget);
    }

    #[test]
    fn test_symmetric_benchmarks_run() {
        let result = symmetric::bench_blake2b(5).unwrap();
        assert_eq!(result.iterations, 5);
        assert!(result.throughput > 0.0);
    }

    #[test]
    fn test_report_saves_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut report = BenchmarkReport::new();
        report.add_result(random::bench_random_bytes(3).unwrap());
        report.save_json(path.to_str().unwrap()).unwrap();

        let parsed: BenchmarkReport = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.results.len(), 1);
    }
}
