use std::process::ExitCode;

use canary_watch::cli::commands::{init, watch};
use canary_watch::cli::{Cli, Commands};
use canary_watch::config::Settings;
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        return report(init::run_init(force));
    }

    let loaded = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match loaded {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Init { .. } => unreachable!(),
        Commands::Config => {
            init::run_config(&settings);
            ExitCode::SUCCESS
        }
        Commands::Watch(args) => report(watch::run(args, settings).await.map(|_| ())),
    }
}

fn report(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
