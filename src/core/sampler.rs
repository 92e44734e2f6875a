//! Log-normal sampling primitives
//!
//! Durations, costs and market multipliers are all strictly positive and
//! right-skewed, so every random draw in the engine goes through a log-normal
//! parameterised by its arithmetic mean and coefficient of variation (CV).

use rand::Rng;
use std::f64::consts::PI;

/// Parameters of the underlying normal distribution for a log-normal
/// with the given arithmetic mean and coefficient of variation.
///
/// `sigma² = ln(1 + cv²)`, `mu = ln(mean) - sigma²/2`
pub fn lognormal_params(mean: f64, cv: f64) -> (f64, f64) {
    let sigma_sq = (1.0 + cv * cv).ln();
    let mu = mean.ln() - sigma_sq / 2.0;
    (mu, sigma_sq.sqrt())
}

/// Standard normal variate from two uniform draws (Box-Muller transform)
///
/// `u1` is floored at the smallest positive f64 so `ln(0)` never happens.
pub fn box_muller(u1: f64, u2: f64) -> f64 {
    let u1 = u1.max(f64::MIN_POSITIVE);
    (-2.0_f64 * u1.ln()).sqrt() * (2.0_f64 * PI * u2).cos()
}

/// Deterministic log-normal draw from two uniforms in [0, 1)
///
/// With `cv = 0` the result is exactly `mean` whatever the uniforms are.
pub fn lognormal_from_uniforms(mean: f64, cv: f64, u1: f64, u2: f64) -> f64 {
    if mean <= 0.0 || cv <= 0.0 {
        return mean.max(0.0);
    }
    let (mu, sigma) = lognormal_params(mean, cv);
    (mu + sigma * box_muller(u1, u2)).exp()
}

/// Draw one log-normal variate with arithmetic mean `mean` and CV `cv`
pub fn sample_lognormal<R: Rng + ?Sized>(rng: &mut R, mean: f64, cv: f64) -> f64 {
    let u1: f64 = rng.random();
    let u2: f64 = rng.random();
    lognormal_from_uniforms(mean, cv, u1, u2)
}
