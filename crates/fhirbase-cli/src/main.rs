mod cli;
mod commands;
mod config;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, ConfigCommands};
use output::print_error;

#[tokio::main]
async fn main() {
    // .env values must be visible before clap reads env fallbacks.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let outcome = tokio::select! {
        res = run(cli) => res,
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("interrupted")),
    };
    if let Err(e) = outcome {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = config::load_config(&cli.global)?;
    observability::init_tracing(&cfg.logging.level);

    match &cli.command {
        Commands::Load(args) => commands::load::load(&cfg, args).await?,
        Commands::Bulkget(args) => commands::bulkget::bulkget(&cfg, args).await?,
        Commands::Transform(args) => commands::transform::transform(&cfg, &args.file)?,
        Commands::Schemas => commands::schemas::schemas(&cfg)?,
        Commands::Config(args) => match &args.command {
            ConfigCommands::Show => commands::config::show(&cfg)?,
        },
    }
    Ok(())
}
