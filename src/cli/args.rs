//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Generate published forecast text from ensemble weather data via LLMs.
#[derive(Parser, Debug)]
#[command(name = "wxgen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    // === Global flags ===
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSON logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Cache root directory (defaults to the platform cache dir)
    #[arg(long, value_name = "DIR", global = true, env = "WXGEN_CACHE_ROOT")]
    pub cache_root: Option<PathBuf>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the forecast pipeline for every configured target
    Run(RunArgs),

    /// Print the deterministic hash of the resolved configuration
    ConfigHash(ConfigHashArgs),

    /// Apply the cache hard-purge policies and report removals
    SweepCache,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the configuration JSON file
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: PathBuf,

    /// Regenerate every target regardless of age or config hash
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Validate configuration and show the plan without generating
    #[arg(long)]
    pub dry_run: bool,

    /// Max targets processed concurrently
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}

/// Arguments for the `config-hash` command.
#[derive(Parser, Debug)]
pub struct ConfigHashArgs {
    /// Path to the configuration JSON file
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: PathBuf,
}
