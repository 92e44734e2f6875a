//! `tft run` command - recorded simulation runs

use clap::Subcommand;
use console::style;
use miette::Result;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::filters::RunStateFilter;
use crate::cli::helpers::{open_context, truncate_str};
use crate::cli::output::{print_structured, tsv_line};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{ForecastStore, RunId, RunState, SimulationRun};

#[derive(Subcommand, Debug)]
pub enum RunCommands {
    /// List recorded runs, newest first
    List(ListArgs),

    /// Show one run
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only runs for this team
    #[arg(long, short = 't')]
    pub team: Option<String>,

    /// Filter by state
    #[arg(long, short = 's', value_enum, default_value = "all")]
    pub state: RunStateFilter,

    /// Show at most this many runs
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Run ID (RUN-...)
    pub id: String,
}

#[derive(Tabled)]
struct RunRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "TEAM")]
    team: String,
    #[tabled(rename = "LINK")]
    link: String,
    #[tabled(rename = "P50")]
    p50: String,
    #[tabled(rename = "P90")]
    p90: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "ACTUAL")]
    actual: String,
}

impl From<&SimulationRun> for RunRow {
    fn from(run: &SimulationRun) -> Self {
        Self {
            id: run.id.to_string(),
            team: truncate_str(&run.team_id, 16),
            link: truncate_str(run.link_id.as_deref().unwrap_or("-"), 16),
            p50: format!("{:.2}", run.p50),
            p90: format!("{:.2}", run.p90),
            state: run.state.to_string(),
            actual: run
                .actual_duration
                .map(|a| format!("{:.2}", a))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub fn run(cmd: RunCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        RunCommands::List(args) => run_list(args, global),
        RunCommands::Show(args) => run_show(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let mut runs: Vec<SimulationRun> = ctx
        .service
        .store()
        .list_runs(args.team.as_deref())
        .map_err(|e| miette::miette!("{}", e))?
        .into_iter()
        .filter(|r| args.state.matches(&r.state))
        .collect();
    if let Some(limit) = args.limit {
        runs.truncate(limit);
    }

    if print_structured(&runs, global.format)? {
        return Ok(());
    }

    if global.format == OutputFormat::Tsv {
        println!(
            "{}",
            tsv_line(["ID", "TEAM", "LINK", "P50", "P90", "STATE", "ACTUAL", "CREATED"])
        );
        for r in &runs {
            println!(
                "{}",
                tsv_line([
                    r.id.to_string(),
                    r.team_id.clone(),
                    r.link_id.clone().unwrap_or_default(),
                    r.p50.to_string(),
                    r.p90.to_string(),
                    r.state.to_string(),
                    r.actual_duration.map(|a| a.to_string()).unwrap_or_default(),
                    r.created_at.to_rfc3339(),
                ])
            );
        }
        return Ok(());
    }

    if runs.is_empty() {
        println!("No simulation runs found.");
        return Ok(());
    }

    let rows: Vec<RunRow> = runs.iter().map(RunRow::from).collect();
    println!("{}", Table::new(rows).with(Style::sharp()));
    println!();
    println!("{} run(s) found.", style(runs.len()).cyan());
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let id: RunId = args
        .id
        .parse()
        .map_err(|e| miette::miette!("Invalid run ID '{}': {}", args.id, e))?;

    let ctx = open_context(global)?;
    let run = ctx
        .service
        .store()
        .get_run(&id)
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| miette::miette!("Simulation run {} not found", id))?;

    if print_structured(&run, global.format)? {
        return Ok(());
    }

    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(run.id).cyan());
    println!("{}: {}", style("Team").bold(), style(&run.team_id).yellow());
    if let Some(ref link) = run.link_id {
        println!("{}: {}", style("Link").bold(), link);
    }
    let state = match run.state {
        RunState::Created => style(run.state.to_string()).yellow(),
        RunState::Calibrated => style(run.state.to_string()).green(),
    };
    println!("{}: {}", style("State").bold(), state);
    println!("{}", style("─".repeat(60)).dim());

    println!("   P50: {:.4}   P90: {:.4}", run.p50, run.p90);
    println!("   Volatility factor used: {:.4}", run.volatility_factor_used);
    if let Some(actual) = run.actual_duration {
        println!("   Actual: {:.4}", actual);
    }
    if let (Some(before), Some(after)) = (run.volatility_before, run.volatility_after) {
        println!(
            "   Team volatility: {:.4} {} {:.4}",
            before,
            style("→").dim(),
            after
        );
    }

    println!("{}", style("─".repeat(60)).dim());
    print!(
        "{}: {}",
        style("Created").dim(),
        run.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(at) = run.calibrated_at {
        print!(
            " | {}: {}",
            style("Calibrated").dim(),
            at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();
    Ok(())
}
