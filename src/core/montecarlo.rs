//! Monte Carlo orchestration
//!
//! Every simulation is a map/reduce: trials are split into fixed-size batches,
//! each batch gets its own RNG seeded from the master seed and the batch index,
//! batches run in parallel on rayon, and the concatenated totals are sorted once
//! before percentiles are read off. Because batch boundaries and seeds do not
//! depend on the thread pool, a given seed always produces the same result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::task::{sample_scope_duration, ProjectScope, VolatilityProfile};

/// Reference iteration count
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// Number of evenly strided points kept for histogram rendering
pub const DEFAULT_HISTOGRAM_BUCKETS: usize = 100;

/// Trials per batch; cancellation is checked between batches
pub const DEFAULT_BATCH_SIZE: u32 = 500;

/// Errors raised while running a simulation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Simulation cancelled")]
    Cancelled,

    #[error("Simulation timed out after {0:?}")]
    TimedOut(Duration),
}

/// Result of a cost, duration or revenue simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Number of trials run
    pub iterations: u32,

    /// Downside quantile
    pub p10: f64,

    pub p50: f64,

    /// Upside quantile (statistical 90th percentile)
    pub p90: f64,

    pub p99: f64,

    pub mean: f64,

    pub std_dev: f64,

    pub min: f64,

    pub max: f64,

    /// Fraction of trials that met the target
    pub probability_of_success: f64,

    /// Evenly strided downsample of the sorted trial outcomes
    pub distribution: Vec<f64>,

    /// Volatility factor the simulation ran with
    pub volatility_factor_used: f64,
}

/// Which side of the target counts as success
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SuccessCriterion {
    /// Outcome <= target (cost and duration)
    AtMost(f64),
    /// Outcome >= target (revenue)
    AtLeast(f64),
}

impl SuccessCriterion {
    fn is_met(&self, value: f64) -> bool {
        match *self {
            SuccessCriterion::AtMost(target) => value <= target,
            SuccessCriterion::AtLeast(target) => value >= target,
        }
    }
}

/// Cooperative cancellation flag shared between a caller and a simulation
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Source of master seeds for simulations
pub trait SeedSource: Send + Sync {
    fn next_seed(&self) -> u64;
}

/// Fresh entropy for every simulation
#[derive(Debug, Clone, Copy, Default)]
pub struct EntropySeeds;

impl SeedSource for EntropySeeds {
    fn next_seed(&self) -> u64 {
        rand::rng().random()
    }
}

/// The same seed every time, for reproducible runs and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedSeed(pub u64);

impl SeedSource for FixedSeed {
    fn next_seed(&self) -> u64 {
        self.0
    }
}

/// Knobs for a single simulation
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub iterations: u32,
    pub histogram_buckets: usize,
    pub batch_size: u32,
    pub timeout: Option<Duration>,
    pub cancel: CancelToken,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            histogram_buckets: DEFAULT_HISTOGRAM_BUCKETS,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: None,
            cancel: CancelToken::new(),
        }
    }
}

impl SimulationOptions {
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn validate(&self) -> Result<(), SimulationError> {
        if self.iterations == 0 {
            return Err(SimulationError::InvalidInput(
                "Iterations must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(SimulationError::InvalidInput(
                "Batch size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Seed for one batch, mixed from the master seed (SplitMix64 finaliser)
fn batch_seed(master: u64, batch: u64) -> u64 {
    let mut z = master ^ batch.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Run `options.iterations` independent trials and return the sorted outcomes
///
/// `trial` is called once per iteration with that batch's RNG.
pub fn run_trials<F>(
    seed: u64,
    options: &SimulationOptions,
    trial: F,
) -> Result<Vec<f64>, SimulationError>
where
    F: Fn(&mut StdRng) -> f64 + Sync,
{
    options.validate()?;

    let iterations = options.iterations;
    let batch_size = options.batch_size;
    let num_batches = iterations.div_ceil(batch_size);
    let deadline = options.timeout.map(|t| (Instant::now() + t, t));

    let batches = (0..num_batches)
        .into_par_iter()
        .map(|batch_idx| {
            if options.cancel.is_cancelled() {
                return Err(SimulationError::Cancelled);
            }
            if let Some((deadline, timeout)) = deadline {
                if Instant::now() >= deadline {
                    return Err(SimulationError::TimedOut(timeout));
                }
            }

            let start = batch_idx * batch_size;
            let len = batch_size.min(iterations - start);
            let mut rng = StdRng::seed_from_u64(batch_seed(seed, batch_idx as u64));

            tracing::debug!(batch = batch_idx, trials = len, "running batch");
            Ok((0..len).map(|_| trial(&mut rng)).collect::<Vec<f64>>())
        })
        .collect::<Result<Vec<Vec<f64>>, SimulationError>>()?;

    let mut totals: Vec<f64> = batches.into_iter().flatten().collect();
    totals.sort_by(|a, b| a.total_cmp(b));
    Ok(totals)
}

/// Value at index `floor(n * quantile)` of a sorted slice
pub fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * quantile).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Evenly strided, order-preserving downsample of a sorted slice
pub fn downsample(sorted: &[f64], buckets: usize) -> Vec<f64> {
    if buckets == 0 || sorted.is_empty() {
        return Vec::new();
    }
    if sorted.len() <= buckets {
        return sorted.to_vec();
    }
    (0..buckets)
        .map(|i| sorted[i * sorted.len() / buckets])
        .collect()
}

/// Reduce sorted trial outcomes into a `SimulationResult`
pub fn summarize(
    sorted: &[f64],
    criterion: SuccessCriterion,
    histogram_buckets: usize,
    volatility_factor_used: f64,
) -> SimulationResult {
    let n = sorted.len();
    if n == 0 {
        return SimulationResult {
            iterations: 0,
            p10: 0.0,
            p50: 0.0,
            p90: 0.0,
            p99: 0.0,
            mean: 0.0,
            std_dev: 0.0,
            min: 0.0,
            max: 0.0,
            probability_of_success: 0.0,
            distribution: Vec::new(),
            volatility_factor_used,
        };
    }

    let mean = sorted.iter().sum::<f64>() / n as f64;
    let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    let successes = sorted.iter().filter(|&&x| criterion.is_met(x)).count();

    SimulationResult {
        iterations: n as u32,
        p10: percentile(sorted, 0.10),
        p50: percentile(sorted, 0.50),
        p90: percentile(sorted, 0.90),
        p99: percentile(sorted, 0.99),
        mean,
        std_dev: variance.sqrt(),
        min: sorted[0],
        max: sorted[n - 1],
        probability_of_success: successes as f64 / n as f64,
        distribution: downsample(sorted, histogram_buckets),
        volatility_factor_used,
    }
}

/// Cost/duration Monte Carlo over a project scope
pub fn simulate_scope(
    scope: &ProjectScope,
    profile: &VolatilityProfile,
    seed: u64,
    options: &SimulationOptions,
) -> Result<SimulationResult, SimulationError> {
    scope.validate().map_err(SimulationError::InvalidInput)?;
    profile.validate().map_err(SimulationError::InvalidInput)?;

    let started = Instant::now();
    let totals = run_trials(seed, options, |rng| {
        sample_scope_duration(rng, &scope.tasks, profile)
    })?;
    let result = summarize(
        &totals,
        SuccessCriterion::AtMost(scope.target),
        options.histogram_buckets,
        profile.volatility_index,
    );

    tracing::info!(
        mode = "cost",
        tasks = scope.tasks.len(),
        iterations = result.iterations,
        p50 = result.p50,
        p90 = result.p90,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "simulation completed"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{Complexity, TaskSpec};

    fn scope(tasks: Vec<TaskSpec>, target: f64) -> ProjectScope {
        ProjectScope::new(tasks, target)
    }

    #[test]
    fn test_percentile_indexing() {
        let sorted: Vec<f64> = (0..100).map(|i| i as f64).collect();
        assert_eq!(percentile(&sorted, 0.5), 50.0);
        assert_eq!(percentile(&sorted, 0.9), 90.0);
        assert_eq!(percentile(&sorted, 0.99), 99.0);
        assert_eq!(percentile(&sorted, 1.0), 99.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_downsample_is_strided_and_ordered() {
        let sorted: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let d = downsample(&sorted, 100);
        assert_eq!(d.len(), 100);
        assert_eq!(d[0], 0.0);
        assert_eq!(d[1], 10.0);
        assert_eq!(d[99], 990.0);
        assert!(d.windows(2).all(|w| w[0] <= w[1]));

        assert_eq!(downsample(&[1.0, 2.0], 100), vec![1.0, 2.0]);
        assert!(downsample(&sorted, 0).is_empty());
    }

    #[test]
    fn test_summarize_probability_of_success() {
        let sorted: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let r = summarize(&sorted, SuccessCriterion::AtMost(3.0), 100, 0.2);
        assert_eq!(r.probability_of_success, 0.3);
        let r = summarize(&sorted, SuccessCriterion::AtLeast(3.0), 100, 0.2);
        assert_eq!(r.probability_of_success, 0.8);
        assert_eq!(r.min, 1.0);
        assert_eq!(r.max, 10.0);
        assert_eq!(r.mean, 5.5);
        assert_eq!(r.volatility_factor_used, 0.2);
    }

    #[test]
    fn test_empty_scope_yields_zero_point_mass() {
        let result = simulate_scope(
            &scope(vec![], 10.0),
            &VolatilityProfile::default(),
            1,
            &SimulationOptions::default(),
        )
        .unwrap();

        assert_eq!(result.iterations, DEFAULT_ITERATIONS);
        assert_eq!(result.p50, 0.0);
        assert_eq!(result.p90, 0.0);
        assert_eq!(result.p99, 0.0);
        assert_eq!(result.std_dev, 0.0);
        assert_eq!(result.probability_of_success, 1.0);
        assert!(result.distribution.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_percentiles_are_ordered() {
        let tasks = vec![
            TaskSpec::new(3.0, Complexity::Low),
            TaskSpec::new(5.0, Complexity::High),
            TaskSpec::new(2.0, Complexity::Medium),
        ];
        let result = simulate_scope(
            &scope(tasks, 30.0),
            &VolatilityProfile::new(1.0, 2.0, 0.4),
            42,
            &SimulationOptions::default(),
        )
        .unwrap();

        assert!(result.p10 <= result.p50);
        assert!(result.p50 <= result.p90);
        assert!(result.p90 <= result.p99);
        assert!((0.0..=1.0).contains(&result.probability_of_success));
        assert_eq!(result.distribution.len(), DEFAULT_HISTOGRAM_BUCKETS);
        assert_eq!(result.volatility_factor_used, 0.4);
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let s = scope(vec![TaskSpec::new(4.0, Complexity::Medium)], 10.0);
        let profile = VolatilityProfile::default();
        let options = SimulationOptions::default();
        let a = simulate_scope(&s, &profile, 77, &options).unwrap();
        let b = simulate_scope(&s, &profile, 77, &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_result_independent_of_thread_count() {
        let s = scope(
            vec![
                TaskSpec::new(4.0, Complexity::Medium),
                TaskSpec::new(2.0, Complexity::High),
            ],
            14.0,
        );
        let profile = VolatilityProfile::new(1.0, 0.5, 0.3);
        let options = SimulationOptions {
            iterations: 10_000,
            batch_size: 500,
            ..SimulationOptions::default()
        };
        let on_pool = |threads: usize| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| simulate_scope(&s, &profile, 2024, &options).unwrap())
        };
        let single = on_pool(1);
        let many = on_pool(8);
        assert_eq!(single, many);
        assert_eq!(single.iterations, 10_000);
    }

    #[test]
    fn test_success_criterion_sides() {
        assert!(SuccessCriterion::AtMost(10.0).is_met(10.0));
        assert!(!SuccessCriterion::AtMost(10.0).is_met(10.5));
        assert!(SuccessCriterion::AtLeast(10.0).is_met(10.0));
        assert!(!SuccessCriterion::AtLeast(10.0).is_met(9.5));
        assert_eq!(SuccessCriterion::AtMost(2.5), SuccessCriterion::AtMost(2.5));
        assert_ne!(SuccessCriterion::AtMost(2.5), SuccessCriterion::AtLeast(2.5));
    }

    #[test]
    fn test_higher_complexity_raises_p50() {
        let profile = VolatilityProfile::new(1.0, 0.5, 0.3);
        let options = SimulationOptions::default();
        let low = simulate_scope(
            &scope(vec![TaskSpec::new(5.0, Complexity::Low)], 10.0),
            &profile,
            9,
            &options,
        )
        .unwrap();
        let high = simulate_scope(
            &scope(vec![TaskSpec::new(5.0, Complexity::High)], 10.0),
            &profile,
            9,
            &options,
        )
        .unwrap();
        assert!(high.p50 > low.p50);
        assert!(high.probability_of_success <= low.probability_of_success);
    }

    #[test]
    fn test_zero_volatility_collapses_distribution() {
        let result = simulate_scope(
            &scope(vec![TaskSpec::new(2.0, Complexity::Low)], 2.5),
            &VolatilityProfile::new(1.0, 0.5, 0.0),
            3,
            &SimulationOptions::default(),
        )
        .unwrap();
        assert_eq!(result.p10, 2.5);
        assert_eq!(result.p99, 2.5);
        assert_eq!(result.probability_of_success, 1.0);
    }

    #[test]
    fn test_partial_last_batch() {
        let options = SimulationOptions {
            iterations: 1_234,
            batch_size: 500,
            ..SimulationOptions::default()
        };
        let totals = run_trials(5, &options, |rng| rng.random::<f64>()).unwrap();
        assert_eq!(totals.len(), 1_234);
        assert!(totals.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let options = SimulationOptions::default().with_cancel(cancel);
        let err = run_trials(1, &options, |_| 1.0).unwrap_err();
        assert_eq!(err, SimulationError::Cancelled);
    }

    #[test]
    fn test_zero_timeout_times_out() {
        let options = SimulationOptions::default().with_timeout(Some(Duration::ZERO));
        let err = run_trials(1, &options, |_| 1.0).unwrap_err();
        assert!(matches!(err, SimulationError::TimedOut(_)));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let options = SimulationOptions::default().with_iterations(0);
        assert!(run_trials(1, &options, |_| 1.0).is_err());

        let bad = scope(vec![TaskSpec::new(-1.0, Complexity::Low)], 10.0);
        let err = simulate_scope(
            &bad,
            &VolatilityProfile::default(),
            1,
            &SimulationOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidInput(_)));
    }
}
