//! Calibration math for the truth loop
//!
//! A recorded prediction (p50, p90) is compared with the observed outcome and
//! the team's volatility index is nudged with an exponential moving average.

use serde::{Deserialize, Serialize};

/// EMA weight given to the implied volatility
pub const LEARNING_RATE: f64 = 0.1;

/// Implied volatility multiplier when the outcome overran p90
pub const OVERRUN_MULTIPLIER: f64 = 1.2;

/// Implied volatility multiplier when the outcome beat p50
pub const UNDERRUN_MULTIPLIER: f64 = 0.95;

/// How an observed outcome relates to the predicted band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationSignal {
    /// Actual > p90: risk was underestimated
    Overrun,
    /// Actual < p50: risk was overestimated
    Underrun,
    /// p50 <= actual <= p90
    WithinBand,
}

impl CalibrationSignal {
    pub fn classify(actual: f64, p50: f64, p90: f64) -> Self {
        if actual > p90 {
            CalibrationSignal::Overrun
        } else if actual < p50 {
            CalibrationSignal::Underrun
        } else {
            CalibrationSignal::WithinBand
        }
    }

    /// Implied volatility given the current factor
    pub fn implied_volatility(self, current: f64) -> f64 {
        match self {
            CalibrationSignal::Overrun => current * OVERRUN_MULTIPLIER,
            CalibrationSignal::Underrun => current * UNDERRUN_MULTIPLIER,
            CalibrationSignal::WithinBand => current,
        }
    }
}

impl std::fmt::Display for CalibrationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationSignal::Overrun => write!(f, "overrun"),
            CalibrationSignal::Underrun => write!(f, "underrun"),
            CalibrationSignal::WithinBand => write!(f, "within band"),
        }
    }
}

/// `current * (1 - rate) + implied * rate`, written so that
/// `implied == current` returns `current` bit for bit
pub fn ema_blend(current: f64, implied: f64, learning_rate: f64) -> f64 {
    current + (implied - current) * learning_rate
}

/// Outcome of calibrating one prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationUpdate {
    pub signal: CalibrationSignal,
    pub previous_factor: f64,
    pub implied_factor: f64,
    pub new_factor: f64,
}

/// Compute the new volatility factor for one observation
pub fn calibrate_factor(current: f64, p50: f64, p90: f64, actual: f64) -> CalibrationUpdate {
    let signal = CalibrationSignal::classify(actual, p50, p90);
    let implied = signal.implied_volatility(current);
    CalibrationUpdate {
        signal,
        previous_factor: current,
        implied_factor: implied,
        new_factor: ema_blend(current, implied, LEARNING_RATE),
    }
}
