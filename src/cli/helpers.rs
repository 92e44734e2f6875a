//! Shared helper functions for CLI commands

use std::fs;
use std::path::Path;

use miette::Result;
use serde::de::DeserializeOwned;

use crate::cli::GlobalOpts;
use crate::core::{Config, ForecastService, SqliteStore};

/// Loaded configuration plus a service over the configured store
pub struct Context {
    pub config: Config,
    pub service: ForecastService<SqliteStore>,
}

/// Load config, apply command-line overrides and open the store
pub fn open_context(global: &GlobalOpts) -> Result<Context> {
    let mut config = Config::load(global.config.as_deref()).map_err(|e| miette::miette!("{}", e))?;

    if let Some(ref db) = global.db {
        config.database = Some(db.clone());
    }
    if let Some(seed) = global.seed {
        config.simulation.seed = Some(seed);
    }
    if let Some(iterations) = global.iterations {
        config.simulation.iterations = iterations;
    }
    config.validate().map_err(|e| miette::miette!("{}", e))?;

    let db_path = config.database_path().map_err(|e| miette::miette!("{}", e))?;
    tracing::debug!(db = %db_path.display(), "opening store");
    let store = SqliteStore::open(&db_path).map_err(|e| miette::miette!("{}", e))?;

    let service = match config.simulation.seed {
        Some(seed) => ForecastService::seeded(store, seed),
        None => ForecastService::new(store),
    }
    .with_options(config.simulation.options())
    .with_default_profile(config.defaults);

    Ok(Context { config, service })
}

/// Read a YAML input file, or JSON when the extension is `.json`
pub fn load_input<T: DeserializeOwned + 'static>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| miette::miette!("Failed to read {}: {}", path.display(), e))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content)
            .map_err(|e| miette::miette!("Invalid JSON in {}: {}", path.display(), e))
    } else {
        serde_yml::from_str(&content)
            .map_err(|e| miette::miette!("Invalid YAML in {}: {}", path.display(), e))
    }
}

/// Round a value for display, picking decimals from the scale of `reference`
///
/// Whole units for large ranges, up to four decimals for small ones.
pub fn smart_round(value: f64, reference: f64) -> String {
    let reference = reference.abs();
    let decimals = if reference >= 1000.0 {
        0
    } else if reference >= 10.0 {
        1
    } else if reference >= 1.0 {
        2
    } else if reference >= 0.01 {
        3
    } else {
        4
    };
    format!("{:.*}", decimals, value)
}

/// Format a 0..=1 fraction as a percentage
pub fn format_percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
