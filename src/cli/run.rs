//! The `run` command: wire up the pipeline and execute it.

use crate::cli::args::RunArgs;
use crate::config::ForecastConfig;
use crate::core::executor::{CancelFlag, DEFAULT_CONCURRENCY, Executor, TaskOutcome};
use crate::core::http;
use crate::error::{ExitCode, Result};
use crate::providers::{Credentials, LlmClient};
use crate::sources::{AlertSource, GeocodeSource, SourceKeys, WeatherSource};
use crate::storage::{AppPaths, CacheStore};

/// Execute a full pipeline run and return the process exit code.
///
/// # Errors
///
/// Configuration errors abort before any task runs; per-task failures
/// are absorbed into the summary and exit code instead.
pub async fn execute(args: &RunArgs, paths: AppPaths) -> Result<ExitCode> {
    let config = ForecastConfig::load(&args.config)?;
    tracing::info!(
        locations = config.locations.len(),
        areas = config.areas.len(),
        config_hash = %config.hash(),
        "Loaded configuration"
    );

    let store = CacheStore::new(&paths.cache_root);
    let llm = LlmClient::new(Credentials::from_env())?;
    let source_keys = SourceKeys::from_env();
    let http = http::default_client()?;

    let weather = WeatherSource::new(http.clone(), store.clone());
    let geocode = GeocodeSource::new(http.clone(), store.clone(), source_keys.google.clone());
    let alerts = AlertSource::new(http, store.clone(), source_keys.openweathermap.clone());

    let cancel = CancelFlag::new();
    spawn_cancel_handler(cancel.clone());

    let executor = Executor::new(
        config,
        store,
        paths,
        llm,
        weather,
        geocode,
        alerts,
        args.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
        args.force,
        cancel,
    );

    if args.dry_run {
        let targets = executor.plan()?;
        println!("Dry run: {} target(s) resolved.", targets.len());
        for target in &targets {
            println!(
                "  {} [{}] model={} days={} thin={}",
                target.name,
                target.slug,
                target.settings.model.model_id,
                target.settings.forecast_days,
                target.settings.thin_select,
            );
        }
        return Ok(ExitCode::Success);
    }

    let (outcomes, summary) = executor.run().await?;

    // One JSON line per rendered result is the output boundary for the
    // external renderer.
    for outcome in &outcomes {
        if let TaskOutcome::Rendered(result) = outcome {
            match serde_json::to_string(result) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!(target = %result.target, error = %e, "Could not serialize result"),
            }
        }
    }

    eprintln!(
        "Run complete: {} generated, {} degraded, {} failed, {} skipped ({} translation failure(s), est. cost {:.1}c)",
        summary.generated,
        summary.degraded,
        summary.failed,
        summary.skipped,
        summary.translation_failures,
        summary.total_cost_cents,
    );
    for note in &summary.notes {
        eprintln!("  - {note}");
    }

    Ok(summary.exit_code())
}

/// First Ctrl-C requests a graceful stop; tasks finish their current
/// stage and persist completed cache writes.
fn spawn_cancel_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Cancellation requested; letting in-flight stages finish");
            cancel.cancel();
        }
    });
}
