use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multi-vault asset router: validate and simulate share-accounting
/// scenarios with settlement shortfalls and haircuts.
#[derive(Parser)]
#[command(name = "vault-router", version, about)]
pub struct Cli {
    /// Log level or tracing directive (e.g. "debug", "vault_router::engine=trace")
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Output the JSON schema for scenario definitions
    Schema,

    /// Print an example scenario JSON
    Example,

    /// Validate a scenario JSON file
    Validate {
        /// Path to the scenario JSON file
        file: PathBuf,
    },

    /// Run a scenario step by step against simulated vaults
    Simulate {
        /// Path to the scenario JSON file
        file: PathBuf,

        /// Persist the final token state to this file
        #[arg(long)]
        state_file: Option<PathBuf>,

        /// Write the full JSON report to this file
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Print every emitted event
        #[arg(long)]
        verbose: bool,
    },

    /// Random operation sequences with invariant checks after every step
    Stress {
        /// Number of independent runs
        #[arg(long, default_value = "20")]
        runs: u32,

        /// Operations per run
        #[arg(long, default_value = "200")]
        steps: u32,

        /// Base seed; run i uses seed + i
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Summarize a persisted state file
    State {
        /// Path to the state file
        file: PathBuf,
    },
}
