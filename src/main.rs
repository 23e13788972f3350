//! wxgen - forecast text generation pipeline
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use wxgen::cli::{Cli, Commands};
use wxgen::core::logging;
use wxgen::storage::AppPaths;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = cli
        .log_level
        .as_deref()
        .and_then(logging::LogLevel::from_arg)
        .or_else(logging::parse_log_level_from_env)
        .unwrap_or_default();
    let log_format = if cli.json_output {
        logging::LogFormat::Json
    } else {
        logging::parse_log_format_from_env().unwrap_or_default()
    };
    logging::init(log_level, log_format, logging::parse_log_file_from_env());

    let paths = cli
        .cache_root
        .as_ref()
        .map_or_else(AppPaths::new, AppPaths::with_root);

    let result = match &cli.command {
        Commands::Run(args) => wxgen::cli::run::execute(args, paths).await,
        Commands::ConfigHash(args) => wxgen::cli::execute_config_hash(args),
        Commands::SweepCache => Ok(wxgen::cli::execute_sweep_cache(&paths)),
    };

    match result {
        Ok(code) => ExitCode::from(i32::from(code) as u8),
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(i32::from(e.exit_code()) as u8)
        }
    }
}
