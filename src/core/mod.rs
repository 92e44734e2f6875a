//! Core module - forecasting engine, persistence and configuration

pub mod calibration;
pub mod config;
pub mod identity;
pub mod logging;
pub mod montecarlo;
pub mod revenue;
pub mod run;
pub mod sampler;
pub mod service;
pub mod store;
pub mod task;

pub use calibration::{calibrate_factor, CalibrationSignal, CalibrationUpdate};
pub use config::{Config, ConfigError};
pub use identity::{IdParseError, RunId};
pub use montecarlo::{
    CancelToken, EntropySeeds, FixedSeed, SeedSource, SimulationError, SimulationOptions,
    SimulationResult,
};
pub use revenue::Deal;
pub use run::{RunState, SimulationRun};
pub use service::{CalibrationReport, Forecast, ForecastError, ForecastService};
pub use store::{ForecastStore, SqliteStore, StoreError, TeamRecord};
pub use task::{Complexity, ProjectScope, TaskSpec, VolatilityProfile};
