use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::FmtSubscriber;

use psdm_cli::cli::{Cli, Commands};
use psdm_cli::config::PsdmConfig;

mod commands;

fn run(cli: &Cli) -> Result<()> {
    let config = PsdmConfig::load(cli.config.as_deref())?;
    match &cli.command {
        Commands::Assemble { input, format } => commands::assemble::handle(input, *format, &config),
        Commands::Fields { kind } => commands::fields::handle(*kind),
        Commands::Graph { command } => commands::graph::handle(command, &config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    // Panicking records are reported per kind; keep the hook output in the log.
    std::panic::set_hook(Box::new(|info| warn!("{info}")));

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
