//! `tft sim` command - cost/duration forecast for a project scope

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::{format_percent, load_input, open_context, smart_round};
use crate::cli::output::{print_structured, tsv_line};
use crate::cli::viz::{render_histogram, TargetSide};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{ProjectScope, RunId, SimulationResult};

#[derive(clap::Args, Debug)]
pub struct SimArgs {
    /// Scope file: tasks plus target (YAML, or JSON with a .json extension)
    #[arg(long, short = 's')]
    pub scope: PathBuf,

    /// Team whose volatility profile drives the forecast
    #[arg(long, short = 't')]
    pub team: String,

    /// Record the run against this request/contract id for later calibration
    #[arg(long, short = 'l')]
    pub link: Option<String>,

    /// Override the scope file's target
    #[arg(long)]
    pub target: Option<f64>,

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

#[derive(Debug, Serialize)]
struct SimOutput<'a> {
    team_id: &'a str,
    target: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_id: Option<RunId>,
    #[serde(flatten)]
    result: &'a SimulationResult,
}

pub fn run(args: SimArgs, global: &GlobalOpts) -> Result<()> {
    let mut scope: ProjectScope = load_input(&args.scope)?;
    if let Some(target) = args.target {
        scope.target = target;
    }

    let ctx = open_context(global)?;
    let options = ctx
        .service
        .options()
        .clone()
        .with_timeout(args.timeout.map(Duration::from_secs).or(ctx.service.options().timeout));

    let forecast = ctx
        .service
        .run_simulation_with(&scope, &args.team, args.link.as_deref(), &options)
        .map_err(|e| miette::miette!("{}", e))?;
    let result = &forecast.result;
    let run_id = forecast.run.as_ref().map(|r| r.id);

    if args.csv {
        return write_distribution_csv(result);
    }

    let output = SimOutput {
        team_id: &args.team,
        target: scope.target,
        run_id,
        result,
    };
    if print_structured(&output, global.format)? {
        return Ok(());
    }

    if global.format == OutputFormat::Tsv {
        println!(
            "{}",
            tsv_line(["RUN", "TEAM", "TARGET", "P10", "P50", "P90", "P99", "MEAN", "SUCCESS"])
        );
        println!(
            "{}",
            tsv_line([
                run_id.map(|id| id.to_string()).unwrap_or_default(),
                args.team.clone(),
                scope.target.to_string(),
                result.p10.to_string(),
                result.p50.to_string(),
                result.p90.to_string(),
                result.p99.to_string(),
                result.mean.to_string(),
                result.probability_of_success.to_string(),
            ])
        );
        return Ok(());
    }

    println!(
        "{} Simulated {} tasks for team {} ({} iterations)",
        style("⚙").cyan(),
        scope.tasks.len(),
        style(&args.team).cyan(),
        result.iterations
    );

    let reference = (result.p90 - result.p10).max(result.p50 * 0.01);
    println!();
    println!(
        "   Target: {}  (probability of success: {})",
        style(smart_round(scope.target, reference)).yellow(),
        style_probability(result.probability_of_success)
    );
    println!(
        "   P10: {}   P50: {}   P90: {}   P99: {}",
        smart_round(result.p10, reference),
        style(smart_round(result.p50, reference)).bold(),
        smart_round(result.p90, reference),
        smart_round(result.p99, reference)
    );
    println!(
        "   Mean: {} ± {}   Range: {} to {}",
        smart_round(result.mean, reference),
        smart_round(result.std_dev, reference),
        smart_round(result.min, reference),
        smart_round(result.max, reference)
    );
    println!("   Volatility factor: {:.4}", result.volatility_factor_used);

    if let Some(ref run) = forecast.run {
        println!();
        println!(
            "{} Recorded run {} (link {})",
            style("✓").green(),
            style(run.id).cyan(),
            style(run.link_id.as_deref().unwrap_or("-")).yellow()
        );
        println!(
            "   Calibrate with: {}",
            style(format!("tft calibrate {} --actual <VALUE>", run.id)).dim()
        );
    }

    if args.histogram {
        println!();
        print!(
            "{}",
            render_histogram(
                &result.distribution,
                args.bins,
                Some((scope.target, TargetSide::AtMost))
            )
        );
    }

    Ok(())
}

/// Color a success probability: green when likely, red when unlikely
pub(crate) fn style_probability(p: f64) -> console::StyledObject<String> {
    let text = format_percent(p);
    if p >= 0.8 {
        style(text).green()
    } else if p >= 0.5 {
        style(text).yellow()
    } else {
        style(text).red()
    }
}

/// Write the downsampled distribution as `bucket,quantile,value` rows
pub(crate) fn write_distribution_csv(result: &SimulationResult) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(io::stdout());
    wtr.write_record(["bucket", "quantile", "value"])
        .into_diagnostic()?;
    let n = result.distribution.len();
    for (i, value) in result.distribution.iter().enumerate() {
        let quantile = i as f64 / n as f64;
        wtr.serialize((i, quantile, value)).into_diagnostic()?;
    }
    wtr.flush().into_diagnostic()?;
    Ok(())
}
