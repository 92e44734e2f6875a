//! Configuration loading
//!
//! Settings come from a YAML file (`$TFT_CONFIG`, else the platform config
//! directory), then environment overrides, then command-line flags applied by
//! the caller. A missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::montecarlo::{
    SimulationOptions, DEFAULT_BATCH_SIZE, DEFAULT_HISTOGRAM_BUCKETS, DEFAULT_ITERATIONS,
};
use crate::core::task::VolatilityProfile;

pub const CONFIG_ENV: &str = "TFT_CONFIG";
pub const DB_ENV: &str = "TFT_DB";
pub const SEED_ENV: &str = "TFT_SEED";
pub const ITERATIONS_ENV: &str = "TFT_ITERATIONS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Could not determine a data directory; set TFT_DB or 'database' in the config")]
    NoDataDir,
}

/// Monte Carlo settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub iterations: u32,
    pub histogram_buckets: usize,
    pub batch_size: u32,
    /// Abort simulations that run longer than this
    pub timeout_secs: Option<u64>,
    /// Fixed master seed; unset means fresh entropy per simulation
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            histogram_buckets: DEFAULT_HISTOGRAM_BUCKETS,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: None,
            seed: None,
        }
    }
}

impl SimulationSettings {
    pub fn options(&self) -> SimulationOptions {
        SimulationOptions {
            iterations: self.iterations,
            histogram_buckets: self.histogram_buckets,
            batch_size: self.batch_size,
            timeout: self.timeout_secs.map(Duration::from_secs),
            ..SimulationOptions::default()
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database path
    pub database: Option<PathBuf>,

    pub simulation: SimulationSettings,

    /// Profile used for teams with nothing stored
    pub defaults: VolatilityProfile,
}

impl Config {
    /// Load from `path`, else `$TFT_CONFIG`, else the platform config file,
    /// then apply env overrides
    ///
    /// An explicitly given file must exist; the fallbacks may be absent.
    /// Not validated here: call [`Config::validate`] once command-line
    /// overrides are applied.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let fallback = std::env::var_os(CONFIG_ENV)
                    .map(PathBuf::from)
                    .or_else(|| project_dirs().map(|d| d.config_dir().join("config.yaml")));
                match fallback {
                    Some(ref p) if p.exists() => Self::from_file(p)?,
                    _ => Self::default(),
                }
            }
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(content).map_err(|e| e.to_string())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(db) = std::env::var_os(DB_ENV) {
            self.database = Some(PathBuf::from(db));
        }
        if let Ok(seed) = std::env::var(SEED_ENV) {
            self.simulation.seed = Some(parse_env(SEED_ENV, &seed)?);
        }
        if let Ok(iterations) = std::env::var(ITERATIONS_ENV) {
            self.simulation.iterations = parse_env(ITERATIONS_ENV, &iterations)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::Invalid {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.simulation.iterations == 0 {
            return Err(invalid("simulation.iterations", "must be at least 1"));
        }
        if self.simulation.histogram_buckets == 0 {
            return Err(invalid("simulation.histogram_buckets", "must be at least 1"));
        }
        if self.simulation.batch_size == 0 {
            return Err(invalid("simulation.batch_size", "must be at least 1"));
        }
        self.defaults
            .validate()
            .map_err(|message| ConfigError::Invalid {
                key: "defaults".to_string(),
                message,
            })
    }

    /// Database path, falling back to the platform data directory
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.database {
            return Ok(path.clone());
        }
        project_dirs()
            .map(|d| d.data_dir().join("forecast.db"))
            .ok_or(ConfigError::NoDataDir)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "tessera", "tessera-forecast")
}
