//! `tft team` command - team volatility profiles

use clap::Subcommand;
use console::style;
use miette::Result;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::helpers::{open_context, truncate_str};
use crate::cli::output::{print_structured, tsv_line};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{ForecastStore, TeamRecord, VolatilityProfile};

#[derive(Subcommand, Debug)]
pub enum TeamCommands {
    /// Create or update a team profile (unset fields keep their current value)
    Set(SetArgs),

    /// Show the profile used for a team
    Show(ShowArgs),

    /// List stored team profiles
    List,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Team ID
    pub team: String,

    /// Median hands-on time per unit of effort
    #[arg(long)]
    pub touch: Option<f64>,

    /// Median waiting time per unit of effort
    #[arg(long)]
    pub queue: Option<f64>,

    /// Volatility index (coefficient of variation of touch time)
    #[arg(long)]
    pub volatility: Option<f64>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Team ID
    pub team: String,
}

#[derive(Debug, Serialize)]
struct TeamView<'a> {
    team_id: &'a str,
    stored: bool,
    #[serde(flatten)]
    profile: VolatilityProfile,
}

#[derive(Tabled)]
struct TeamRow {
    #[tabled(rename = "TEAM")]
    team: String,
    #[tabled(rename = "TOUCH")]
    touch: String,
    #[tabled(rename = "QUEUE")]
    queue: String,
    #[tabled(rename = "VOLATILITY")]
    volatility: String,
    #[tabled(rename = "UPDATED")]
    updated: String,
}

impl From<&TeamRecord> for TeamRow {
    fn from(record: &TeamRecord) -> Self {
        Self {
            team: truncate_str(&record.team_id, 24),
            touch: format!("{:.3}", record.profile.median_touch_time),
            queue: format!("{:.3}", record.profile.median_queue_time),
            volatility: format!("{:.4}", record.profile.volatility_index),
            updated: record.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

pub fn run(cmd: TeamCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        TeamCommands::Set(args) => run_set(args, global),
        TeamCommands::Show(args) => run_show(args, global),
        TeamCommands::List => run_list(global),
    }
}

fn run_set(args: SetArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let current = ctx
        .service
        .profile_for(&args.team)
        .map_err(|e| miette::miette!("{}", e))?;

    let profile = VolatilityProfile {
        median_touch_time: args.touch.unwrap_or(current.median_touch_time),
        median_queue_time: args.queue.unwrap_or(current.median_queue_time),
        volatility_index: args.volatility.unwrap_or(current.volatility_index),
    };
    ctx.service
        .set_profile(&args.team, &profile)
        .map_err(|e| miette::miette!("{}", e))?;

    let view = TeamView {
        team_id: &args.team,
        stored: true,
        profile,
    };
    if print_structured(&view, global.format)? {
        return Ok(());
    }

    println!(
        "{} Saved profile for team {}",
        style("✓").green(),
        style(&args.team).cyan()
    );
    print_profile(&profile);
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let stored = ctx
        .service
        .store()
        .load_profile(&args.team)
        .map_err(|e| miette::miette!("{}", e))?;
    let profile = stored.unwrap_or(ctx.config.defaults);

    let view = TeamView {
        team_id: &args.team,
        stored: stored.is_some(),
        profile,
    };
    if print_structured(&view, global.format)? {
        return Ok(());
    }

    if global.format == OutputFormat::Tsv {
        println!("{}", tsv_line(["TEAM", "TOUCH", "QUEUE", "VOLATILITY", "STORED"]));
        println!(
            "{}",
            tsv_line([
                args.team.clone(),
                profile.median_touch_time.to_string(),
                profile.median_queue_time.to_string(),
                profile.volatility_index.to_string(),
                view.stored.to_string(),
            ])
        );
        return Ok(());
    }

    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("Team").bold(), style(&args.team).cyan());
    if !view.stored {
        println!("{}", style("(no stored profile, showing defaults)").dim());
    }
    println!("{}", style("─".repeat(60)).dim());
    print_profile(&profile);
    Ok(())
}

fn run_list(global: &GlobalOpts) -> Result<()> {
    let ctx = open_context(global)?;
    let teams = ctx
        .service
        .store()
        .list_teams()
        .map_err(|e| miette::miette!("{}", e))?;

    if print_structured(&teams, global.format)? {
        return Ok(());
    }

    if global.format == OutputFormat::Tsv {
        println!("{}", tsv_line(["TEAM", "TOUCH", "QUEUE", "VOLATILITY", "UPDATED"]));
        for t in &teams {
            println!(
                "{}",
                tsv_line([
                    t.team_id.clone(),
                    t.profile.median_touch_time.to_string(),
                    t.profile.median_queue_time.to_string(),
                    t.profile.volatility_index.to_string(),
                    t.updated_at.to_rfc3339(),
                ])
            );
        }
        return Ok(());
    }

    if teams.is_empty() {
        println!("No team profiles stored.");
        println!(
            "Create one with: {}",
            style("tft team set <TEAM> --volatility 0.2").yellow()
        );
        return Ok(());
    }

    let rows: Vec<TeamRow> = teams.iter().map(TeamRow::from).collect();
    println!("{}", Table::new(rows).with(Style::sharp()));
    println!();
    println!("{} team(s) found.", style(teams.len()).cyan());
    Ok(())
}

fn print_profile(profile: &VolatilityProfile) {
    println!("   Median touch time: {:.3}", profile.median_touch_time);
    println!("   Median queue time: {:.3}", profile.median_queue_time);
    println!("   Volatility index:  {:.4}", profile.volatility_index);
}
