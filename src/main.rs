//! walkthrough - run guided UI walkthroughs from YAML catalogs
//!
//! Loads walkthrough definitions, expands their fragments and drives them
//! step by step against a scripted host UI.

use clap::Parser;
use std::process::ExitCode;
use walkthrough::commands::Commands;
use walkthrough::common::{config::Config, logging};
use walkthrough::cli;

#[derive(Parser)]
#[command(name = "walkthrough", about = "Step-driven guided walkthrough runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Debug-level logging for this crate
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    // Dropped on return, flushing buffered file logs on failure paths too
    let log_file = config.logging.resolved_file();
    let _log_guard = logging::init_cli(cli.verbose, log_file.as_deref());

    match cli::dispatch(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
