use clap::Parser;
use miette::Result;
use tft::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Install miette's fancy error handler
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    tft::core::logging::init_tracing(cli.global.verbose);

    match cli.command {
        Commands::Sim(args) => tft::cli::commands::sim::run(args, &cli.global),
        Commands::Revenue(args) => tft::cli::commands::revenue::run(args, &cli.global),
        Commands::Calibrate(args) => tft::cli::commands::calibrate::run(args, &cli.global),
        Commands::Team(cmd) => tft::cli::commands::team::run(cmd, &cli.global),
        Commands::Run(cmd) => tft::cli::commands::runs::run(cmd, &cli.global),
        Commands::Completions(args) => tft::cli::commands::completions::run(args),
    }
}
