//! `tft revenue` command - revenue forecast for a deal pipeline

use std::path::PathBuf;
use std::time::Duration;

use console::style;
use miette::Result;
use serde::{Deserialize, Serialize};

use crate::cli::commands::sim::{style_probability, write_distribution_csv};
use crate::cli::helpers::{load_input, open_context, smart_round};
use crate::cli::output::{print_structured, tsv_line};
use crate::cli::viz::{render_histogram, TargetSide};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{Deal, SimulationResult};

#[derive(clap::Args, Debug)]
pub struct RevenueArgs {
    /// Deals file: a list of {amount, probability}, or {deals: [...]}
    #[arg(long, short = 'd')]
    pub deals: PathBuf,

    /// Market volatility (coefficient of variation of the shared market multiplier)
    #[arg(long, default_value = "0.2")]
    pub volatility: f64,

    /// Revenue target; trials at or over it count as success
    #[arg(long, default_value = "0")]
    pub target: f64,

    /// Abort the simulation after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Show ASCII histogram of the forecast distribution
    #[arg(long, short = 'H')]
    pub histogram: bool,

    /// Number of histogram bins
    #[arg(long, default_value = "20")]
    pub bins: usize,

    /// Output the downsampled distribution as CSV
    #[arg(long)]
    pub csv: bool,
}

/// Accepted shapes of a deals file
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DealsFile {
    List(Vec<Deal>),
    Wrapped { deals: Vec<Deal> },
}

impl DealsFile {
    fn into_deals(self) -> Vec<Deal> {
        match self {
            DealsFile::List(deals) | DealsFile::Wrapped { deals } => deals,
        }
    }
}

#[derive(Debug, Serialize)]
struct RevenueOutput<'a> {
    deals: usize,
    expected_value: f64,
    market_volatility: f64,
    target: f64,
    #[serde(flatten)]
    result: &'a SimulationResult,
}

pub fn run(args: RevenueArgs, global: &GlobalOpts) -> Result<()> {
    let deals = load_input::<DealsFile>(&args.deals)?.into_deals();

    let ctx = open_context(global)?;
    let options = ctx
        .service
        .options()
        .clone()
        .with_timeout(args.timeout.map(Duration::from_secs).or(ctx.service.options().timeout));

    let result = ctx
        .service
        .run_revenue_simulation_with(&deals, args.volatility, args.target, &options)
        .map_err(|e| miette::miette!("{}", e))?;

    if args.csv {
        return write_distribution_csv(&result);
    }

    let expected_value: f64 = deals.iter().map(Deal::expected_value).sum();
    let output = RevenueOutput {
        deals: deals.len(),
        expected_value,
        market_volatility: args.volatility,
        target: args.target,
        result: &result,
    };
    if print_structured(&output, global.format)? {
        return Ok(());
    }

    if global.format == OutputFormat::Tsv {
        println!(
            "{}",
            tsv_line(["DEALS", "EXPECTED", "TARGET", "P10", "P50", "P90", "MEAN", "SUCCESS"])
        );
        println!(
            "{}",
            tsv_line([
                deals.len().to_string(),
                expected_value.to_string(),
                args.target.to_string(),
                result.p10.to_string(),
                result.p50.to_string(),
                result.p90.to_string(),
                result.mean.to_string(),
                result.probability_of_success.to_string(),
            ])
        );
        return Ok(());
    }

    println!(
        "{} Simulated pipeline of {} deals ({} iterations, market volatility {})",
        style("⚙").cyan(),
        deals.len(),
        result.iterations,
        args.volatility
    );

    let reference = expected_value.max(result.max);
    println!();
    println!(
        "   Weighted pipeline: {}",
        style(smart_round(expected_value, reference)).yellow()
    );
    println!(
        "   Downside (P10): {}   Median: {}   Upside (P90): {}",
        style(smart_round(result.p10, reference)).red(),
        style(smart_round(result.p50, reference)).bold(),
        style(smart_round(result.p90, reference)).green()
    );
    println!(
        "   Mean: {} ± {}",
        smart_round(result.mean, reference),
        smart_round(result.std_dev, reference)
    );
    if args.target > 0.0 {
        println!(
            "   Target: {}  (probability of reaching: {})",
            smart_round(args.target, reference),
            style_probability(result.probability_of_success)
        );
    }

    if args.histogram {
        println!();
        let target = (args.target > 0.0).then_some((args.target, TargetSide::AtLeast));
        print!("{}", render_histogram(&result.distribution, args.bins, target));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deals_file_shapes() {
        let list: DealsFile =
            serde_yml::from_str("- amount: 100\n  probability: 0.5\n").unwrap();
        assert_eq!(list.into_deals(), vec![Deal::new(100.0, 0.5)]);

        let wrapped: DealsFile = serde_json::from_str(
            r#"{"deals": [{"amount": 10, "probability": 1.0}, {"amount": 5, "probability": 0}]}"#,
        )
        .unwrap();
        assert_eq!(wrapped.into_deals().len(), 2);
    }
}
