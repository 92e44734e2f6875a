//! Revenue scenario simulation
//!
//! Each trial draws one market-condition multiplier shared by every deal in
//! the pipeline, so a bad trial depresses all close probabilities together.
//! That correlation widens the tails compared with independent Bernoulli draws.

use std::time::Instant;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::montecarlo::{
    run_trials, summarize, SimulationError, SimulationOptions, SimulationResult, SuccessCriterion,
};
use crate::core::sampler::sample_lognormal;

/// A probabilistic deal in a sales pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    /// Value if won (>= 0)
    pub amount: f64,

    /// Close probability in [0, 1]
    pub probability: f64,
}

impl Deal {
    pub fn new(amount: f64, probability: f64) -> Self {
        Self {
            amount,
            probability,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.amount.is_finite() && self.amount >= 0.0) {
            return Err(format!("Deal amount must be >= 0, got {}", self.amount));
        }
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(format!(
                "Deal probability must be in [0, 1], got {}",
                self.probability
            ));
        }
        Ok(())
    }

    /// Expected value ignoring market risk
    pub fn expected_value(&self) -> f64 {
        self.amount * self.probability
    }
}

/// Close probability under a market condition, clamped to [0, 1]
pub fn adjusted_probability(probability: f64, market_condition: f64) -> f64 {
    (probability * market_condition).clamp(0.0, 1.0)
}

/// One trial: shared market multiplier, then a Bernoulli draw per deal
pub fn sample_pipeline_revenue<R: Rng + ?Sized>(
    rng: &mut R,
    deals: &[Deal],
    volatility_factor: f64,
) -> f64 {
    let market_condition = sample_lognormal(rng, 1.0, volatility_factor);
    deals
        .iter()
        .filter(|deal| {
            let p = adjusted_probability(deal.probability, market_condition);
            rng.random::<f64>() < p
        })
        .map(|deal| deal.amount)
        .sum()
}

/// Revenue Monte Carlo over a deal list
///
/// `target` is the revenue goal; `probability_of_success` is the share of
/// trials reaching it. A target of zero makes every trial a success.
pub fn simulate_pipeline(
    deals: &[Deal],
    volatility_factor: f64,
    target: f64,
    seed: u64,
    options: &SimulationOptions,
) -> Result<SimulationResult, SimulationError> {
    if !(volatility_factor.is_finite() && volatility_factor >= 0.0) {
        return Err(SimulationError::InvalidInput(format!(
            "Volatility factor must be >= 0, got {}",
            volatility_factor
        )));
    }
    if !target.is_finite() {
        return Err(SimulationError::InvalidInput(format!(
            "Target revenue must be finite, got {}",
            target
        )));
    }
    for (i, deal) in deals.iter().enumerate() {
        deal.validate()
            .map_err(|e| SimulationError::InvalidInput(format!("Deal {}: {}", i + 1, e)))?;
    }

    let started = Instant::now();
    let totals = run_trials(seed, options, |rng| {
        sample_pipeline_revenue(rng, deals, volatility_factor)
    })?;
    let result = summarize(
        &totals,
        SuccessCriterion::AtLeast(target),
        options.histogram_buckets,
        volatility_factor,
    );

    tracing::info!(
        mode = "revenue",
        deals = deals.len(),
        iterations = result.iterations,
        p10 = result.p10,
        p50 = result.p50,
        p90 = result.p90,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "simulation completed"
    );
    Ok(result)
}
