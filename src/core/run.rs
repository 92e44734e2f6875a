//! Persisted simulation runs
//!
//! A run is created when a linked cost simulation finishes and moves to
//! `Calibrated` exactly once, when the real outcome is reported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::RunId;
use crate::core::montecarlo::SimulationResult;

/// Lifecycle state of a simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum RunState {
    #[default]
    Created,
    Calibrated,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Created => write!(f, "created"),
            RunState::Calibrated => write!(f, "calibrated"),
        }
    }
}

impl std::str::FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(RunState::Created),
            "calibrated" => Ok(RunState::Calibrated),
            _ => Err(format!("Unknown run state: {}", s)),
        }
    }
}

/// A stored prediction, waiting for (or holding) its observed outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    pub id: RunId,

    pub team_id: String,

    /// Upstream request this run was made for (e.g. a budget request)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_id: Option<String>,

    pub p50: f64,

    pub p90: f64,

    pub volatility_factor_used: f64,

    pub state: RunState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibrated_at: Option<DateTime<Utc>>,

    /// Team factor before and after this run's calibration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility_before: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility_after: Option<f64>,

    pub created_at: DateTime<Utc>,
}

impl SimulationRun {
    /// New run in the `Created` state from a finished simulation
    pub fn from_result(team_id: &str, link_id: Option<&str>, result: &SimulationResult) -> Self {
        Self {
            id: RunId::new(),
            team_id: team_id.to_string(),
            link_id: link_id.map(str::to_string),
            p50: result.p50,
            p90: result.p90,
            volatility_factor_used: result.volatility_factor_used,
            state: RunState::Created,
            actual_duration: None,
            calibrated_at: None,
            volatility_before: None,
            volatility_after: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.state == RunState::Calibrated
    }
}
