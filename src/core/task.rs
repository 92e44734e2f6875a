//! Task duration model
//!
//! A task's simulated duration is "touch time" (doing the work) plus
//! "queue time" (waiting for it). Queue time is sampled with 1.5x the team's
//! volatility, since waits dominate tail risk more than effort variance does.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::sampler::sample_lognormal;

/// Extra volatility applied to queue time relative to touch time
pub const QUEUE_VOLATILITY_FACTOR: f64 = 1.5;

/// Task complexity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl Complexity {
    /// Effort multiplier for this complexity
    pub fn multiplier(self) -> f64 {
        match self {
            Complexity::Low => 1.0,
            Complexity::Medium => 1.5,
            Complexity::High => 2.5,
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Low => write!(f, "low"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Complexity::Low),
            "medium" => Ok(Complexity::Medium),
            "high" => Ok(Complexity::High),
            _ => Err(format!("Unknown complexity: {}", s)),
        }
    }
}

/// One unit of work in a project scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Estimated effort in the team's effort units (must be > 0)
    pub estimated_effort: f64,

    #[serde(default)]
    pub complexity: Complexity,
}

impl TaskSpec {
    pub fn new(estimated_effort: f64, complexity: Complexity) -> Self {
        Self {
            estimated_effort,
            complexity,
        }
    }

    /// Effort after the complexity multiplier
    pub fn base_effort(&self) -> f64 {
        self.estimated_effort * self.complexity.multiplier()
    }
}

/// A backlog of tasks plus the budget or deadline it is measured against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectScope {
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,

    /// Budget or time target; trials at or under it count as success
    #[serde(alias = "target_budget_or_time")]
    pub target: f64,
}

impl ProjectScope {
    pub fn new(tasks: Vec<TaskSpec>, target: f64) -> Self {
        Self { tasks, target }
    }

    /// Check every task has a positive, finite effort and the target is finite
    pub fn validate(&self) -> Result<(), String> {
        if !self.target.is_finite() {
            return Err(format!("Target must be finite, got {}", self.target));
        }
        for (i, task) in self.tasks.iter().enumerate() {
            if !(task.estimated_effort.is_finite() && task.estimated_effort > 0.0) {
                return Err(format!(
                    "Task {} has invalid estimated effort {} (must be > 0)",
                    i + 1,
                    task.estimated_effort
                ));
            }
        }
        Ok(())
    }
}

/// A team's flow characteristics
///
/// `volatility_index` is a coefficient of variation; it is the only field
/// the calibration loop ever writes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityProfile {
    pub median_touch_time: f64,
    pub median_queue_time: f64,
    pub volatility_index: f64,
}

impl Default for VolatilityProfile {
    fn default() -> Self {
        Self {
            median_touch_time: 1.0,
            median_queue_time: 0.5,
            volatility_index: 0.2,
        }
    }
}

impl VolatilityProfile {
    pub fn new(median_touch_time: f64, median_queue_time: f64, volatility_index: f64) -> Self {
        Self {
            median_touch_time,
            median_queue_time,
            volatility_index,
        }
    }

    /// Same profile with a different volatility index
    pub fn with_volatility(self, volatility_index: f64) -> Self {
        Self {
            volatility_index,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.median_touch_time.is_finite() && self.median_touch_time > 0.0) {
            return Err(format!(
                "Median touch time must be > 0, got {}",
                self.median_touch_time
            ));
        }
        if !(self.median_queue_time.is_finite() && self.median_queue_time >= 0.0) {
            return Err(format!(
                "Median queue time must be >= 0, got {}",
                self.median_queue_time
            ));
        }
        if !(self.volatility_index.is_finite() && self.volatility_index >= 0.0) {
            return Err(format!(
                "Volatility index must be >= 0, got {}",
                self.volatility_index
            ));
        }
        Ok(())
    }
}

/// Simulate one task's duration for one trial
pub fn sample_task_duration<R: Rng + ?Sized>(
    rng: &mut R,
    task: &TaskSpec,
    profile: &VolatilityProfile,
) -> f64 {
    let touch = sample_lognormal(
        rng,
        task.base_effort() * profile.median_touch_time,
        profile.volatility_index,
    );
    let queue = sample_lognormal(
        rng,
        profile.median_queue_time,
        profile.volatility_index * QUEUE_VOLATILITY_FACTOR,
    );
    touch + queue
}

/// Simulate one trial's total duration across a whole scope
pub fn sample_scope_duration<R: Rng + ?Sized>(
    rng: &mut R,
    tasks: &[TaskSpec],
    profile: &VolatilityProfile,
) -> f64 {
    tasks
        .iter()
        .map(|task| sample_task_duration(rng, task, profile))
        .sum()
}
