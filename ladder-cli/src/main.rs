//! Ladder CLI - schema upgrades from your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{doctor, history, plan, stamp, status, upgrade};

/// Ladder - sequential, versioned schema upgrades
#[derive(Parser)]
#[command(name = "ladder", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the recorded schema version and whether an upgrade is needed
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upgrade the database to a supported schema version
    Upgrade {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the steps an upgrade would apply, without running them
    Plan {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a schema version without running any step
    Stamp {
        /// Version to record
        version: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// View and manage the upgrade history
    History {
        #[command(subcommand)]
        command: history::HistoryCommands,
    },

    /// Check the manifest, the scripts and the recorded version
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    // Diagnostics go to stderr so --json output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LADDER_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::Upgrade { json } => upgrade::run(json),
        Commands::Plan { json } => plan::run(json),
        Commands::Stamp { version, force } => stamp::run(&version, force),
        Commands::History { command } => history::run(command),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
    }
}
