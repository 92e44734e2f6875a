//! `tft calibrate` command - report a real outcome for a recorded run

use console::style;
use miette::Result;

use crate::cli::helpers::open_context;
use crate::cli::output::{print_structured, tsv_line};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{CalibrationSignal, RunId};

#[derive(clap::Args, Debug)]
pub struct CalibrateArgs {
    /// Run ID (RUN-...) printed by `tft sim --link`
    pub run_id: String,

    /// Observed duration or cost
    #[arg(long, short = 'a')]
    pub actual: f64,
}

pub fn run(args: CalibrateArgs, global: &GlobalOpts) -> Result<()> {
    let run_id: RunId = args
        .run_id
        .parse()
        .map_err(|e| miette::miette!("Invalid run ID '{}': {}", args.run_id, e))?;

    let ctx = open_context(global)?;
    let report = ctx
        .service
        .calibrate(&run_id, args.actual)
        .map_err(|e| miette::miette!("{}", e))?;

    if print_structured(&report, global.format)? {
        return Ok(());
    }

    let update = &report.update;
    if global.format == OutputFormat::Tsv {
        println!(
            "{}",
            tsv_line(["RUN", "TEAM", "ACTUAL", "SIGNAL", "BEFORE", "AFTER"])
        );
        println!(
            "{}",
            tsv_line([
                report.run_id.to_string(),
                report.team_id.clone(),
                report.actual.to_string(),
                update.signal.to_string(),
                update.previous_factor.to_string(),
                update.new_factor.to_string(),
            ])
        );
        return Ok(());
    }

    let signal = match update.signal {
        CalibrationSignal::Overrun => style(update.signal.to_string()).red(),
        CalibrationSignal::Underrun => style(update.signal.to_string()).green(),
        CalibrationSignal::WithinBand => style(update.signal.to_string()).dim(),
    };
    println!(
        "{} Calibrated run {} ({})",
        style("✓").green(),
        style(report.run_id).cyan(),
        signal
    );
    println!(
        "   Team {} volatility: {:.4} {} {:.4}",
        style(&report.team_id).cyan(),
        update.previous_factor,
        style("→").dim(),
        update.new_factor
    );

    Ok(())
}
