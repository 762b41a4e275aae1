//! CLI command definitions
//!
//! Defines the clap commands for the walkthrough CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::tour::{Edition, Platform};

#[derive(Subcommand)]
pub enum Commands {
    /// Run a walkthrough against a scripted UI
    Run {
        /// Path to the YAML walkthrough catalog
        catalog: PathBuf,

        /// Path to the YAML UI script that simulates the host application
        #[arg(long)]
        ui: PathBuf,

        /// Walkthrough to run (default: the first eligible one)
        #[arg(long)]
        id: Option<String>,

        #[command(flatten)]
        context: ContextArgs,

        /// Per-step trigger timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List walkthroughs eligible for a context, in priority order
    #[command(alias = "ls")]
    List {
        /// Path to the YAML walkthrough catalog
        catalog: PathBuf,

        #[command(flatten)]
        context: ContextArgs,

        /// List every registered walkthrough, eligible or not
        #[arg(long)]
        all: bool,
    },

    /// Show the expanded steps of a walkthrough
    Show {
        /// Path to the YAML walkthrough catalog
        catalog: PathBuf,

        /// Walkthrough identifier
        id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load a catalog and expand every fragment and walkthrough
    Check {
        /// Path to the YAML walkthrough catalog
        catalog: PathBuf,
    },
}

/// Eligibility context overrides
#[derive(Args, Debug, Default)]
pub struct ContextArgs {
    /// Current page url (default: the UI script's url, or any)
    #[arg(long)]
    pub url: Option<String>,

    /// Product edition: community or enterprise
    #[arg(long)]
    pub edition: Option<Edition>,

    /// Device class: desktop or mobile
    #[arg(long)]
    pub platform: Option<Platform>,
}
