//! CLI argument parsing and command dispatch.

pub mod args;
pub mod run;

pub use args::{Cli, Commands, ConfigHashArgs, RunArgs};

use crate::config::ForecastConfig;
use crate::error::{ExitCode, Result};
use crate::storage::{AppPaths, CacheStore, Namespace};

/// The `config-hash` command: print the whole-config digest for
/// cron-style "has anything changed" checks.
///
/// # Errors
///
/// Config load/parse errors.
pub fn execute_config_hash(args: &ConfigHashArgs) -> Result<ExitCode> {
    let config = ForecastConfig::load(&args.config)?;
    println!("{}", config.hash());
    Ok(ExitCode::Success)
}

/// The `sweep-cache` command: apply every namespace's hard-purge policy.
#[must_use]
pub fn execute_sweep_cache(paths: &AppPaths) -> ExitCode {
    let store = CacheStore::new(&paths.cache_root);
    for namespace in Namespace::ALL {
        let removed = store.sweep(*namespace);
        println!("{}: removed {removed} entries", namespace.dir_name());
    }
    ExitCode::Success
}
