//! Top-level argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::commands::calibrate::CalibrateArgs;
use crate::cli::commands::completions::CompletionsArgs;
use crate::cli::commands::revenue::RevenueArgs;
use crate::cli::commands::runs::RunCommands;
use crate::cli::commands::sim::SimArgs;
use crate::cli::commands::team::TeamCommands;

#[derive(Parser, Debug)]
#[command(name = "tft")]
#[command(author, version, about = "Tessera Forecast Toolkit - Monte Carlo forecasting for delivery and revenue")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Config file (default: platform config directory)
    #[arg(long, global = true, env = "TFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database holding team profiles and simulation runs
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value = "auto")]
    pub format: OutputFormat,

    /// Fixed master seed for reproducible forecasts
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Monte Carlo iterations per simulation
    #[arg(long, short = 'n', global = true)]
    pub iterations: Option<u32>,

    /// Debug logging on stderr (TFT_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Forecast cost/duration for a project scope
    Sim(SimArgs),

    /// Forecast revenue for a deal pipeline
    Revenue(RevenueArgs),

    /// Feed an observed outcome back into a team's volatility
    Calibrate(CalibrateArgs),

    /// Team volatility profiles
    #[command(subcommand)]
    Team(TeamCommands),

    /// Recorded simulation runs
    #[command(subcommand)]
    Run(RunCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Auto,
    /// JSON
    Json,
    /// YAML
    Yaml,
    /// Tab-separated values
    Tsv,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tft", "sim", "--scope", "scope.yaml", "--team", "core", "--seed", "7", "-n", "500",
        ])
        .unwrap();
        assert_eq!(cli.global.seed, Some(7));
        assert_eq!(cli.global.iterations, Some(500));
        assert!(matches!(cli.command, Commands::Sim(_)));
    }

    #[test]
    fn test_format_parsing() {
        let cli = Cli::try_parse_from(["tft", "-f", "json", "team", "list"]).unwrap();
        assert_eq!(cli.global.format, OutputFormat::Json);
    }
}
