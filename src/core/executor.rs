//! Per-target forecast pipeline executor.
//!
//! Each target runs the state machine
//! `PENDING → ACQUIRING → PROCESSED → GENERATING → RENDERED`, with
//! `FAILED` reachable from the acquiring and generating stages on
//! unrecoverable errors. A bounded worker pool executes independent
//! targets concurrently; within one task the stages are strictly
//! sequential. One target failing never aborts its siblings, and a
//! failed LLM call degrades the result to the dataset-preview text
//! instead of failing the task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::config::{AreaMode, ForecastConfig, SettingsBag};
use crate::core::dataset::{
    ProcessedDay, build_processed_days, dataset_preview, format_area_dataset_text,
    format_dataset_text,
};
use crate::core::prompts;
use crate::core::refresh::{RefreshGate, target_settings_hash};
use crate::error::{Result, WxError};
use crate::providers::{GenerationRequest, LlmClient, LlmKind, resolve_provider, select_model};
use crate::sources::{
    AlertSource, AlertSummary, ContextType, GeocodeResult, GeocodeSource, ImpactRequest,
    ImpactSource, ForecastRequest, WeatherSource,
};
use crate::storage::{AppPaths, CacheStore, Namespace};
use crate::util::{current_season, local_now, slugify};

/// Default worker pool width.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Lifecycle state of one forecast task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Acquiring,
    Processed,
    Generating,
    Rendered,
    Failed,
}

/// What kind of target a task covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Location,
    Area,
    Regional,
}

impl TargetKind {
    const fn context_type(self) -> ContextType {
        match self {
            Self::Location => ContextType::Location,
            Self::Area => ContextType::Area,
            Self::Regional => ContextType::Regional,
        }
    }
}

/// One unit of work: a target with its resolved settings.
#[derive(Debug, Clone)]
pub struct ForecastTarget {
    pub name: String,
    pub slug: String,
    pub kind: TargetKind,
    pub settings: SettingsBag,
    /// Representative locations (areas only).
    pub member_locations: Vec<String>,
}

/// Where the final text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultSource {
    Generated,
    DegradedFallback,
}

/// The record handed to the (external) renderer for one target.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResult {
    pub target: String,
    pub slug: String,
    pub text: String,
    pub source: ResultSource,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_cents: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    /// Set when a requested translation failed; the primary text stands.
    pub translation_failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_context: Option<String>,
    pub issued_at: DateTime<Utc>,
}

/// Terminal outcome of one task.
#[derive(Debug)]
pub enum TaskOutcome {
    Rendered(Box<ForecastResult>),
    Failed {
        target: String,
        slug: String,
        error: WxError,
    },
    Skipped {
        target: String,
        slug: String,
        reason: String,
    },
}

/// Aggregated run results; drives the process exit code.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub generated: usize,
    pub degraded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub translation_failures: usize,
    pub total_cost_cents: f64,
    pub notes: Vec<String>,
}

impl RunSummary {
    /// Degraded results count as soft successes; only FAILED tasks make
    /// the run exit non-zero.
    #[must_use]
    pub const fn exit_code(&self) -> crate::error::ExitCode {
        if self.failed > 0 {
            crate::error::ExitCode::GeneralError
        } else {
            crate::error::ExitCode::Success
        }
    }

    fn absorb(&mut self, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Rendered(result) => {
                if result.degraded {
                    self.degraded += 1;
                    self.notes
                        .push(format!("{}: degraded to dataset preview", result.target));
                } else {
                    self.generated += 1;
                }
                if result.translation_failed {
                    self.translation_failures += 1;
                    self.notes
                        .push(format!("{}: translation failed", result.target));
                }
                if let Some(cost) = result.cost_cents {
                    self.total_cost_cents += cost;
                }
            }
            TaskOutcome::Failed { target, error, .. } => {
                self.failed += 1;
                self.notes.push(format!("{target}: FAILED ({error})"));
            }
            TaskOutcome::Skipped { target, reason, .. } => {
                self.skipped += 1;
                self.notes.push(format!("{target}: skipped ({reason})"));
            }
        }
    }
}

/// Cooperative run-level cancellation flag.
///
/// Cancellation is only observed between stages, so an in-flight stage
/// always finishes and publishes its cache writes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a run needs, wired once at startup.
pub struct Executor {
    config: ForecastConfig,
    store: CacheStore,
    paths: AppPaths,
    llm: LlmClient,
    weather: WeatherSource,
    geocode: GeocodeSource,
    alerts: AlertSource,
    concurrency: usize,
    force: bool,
    cancel: CancelFlag,
}

impl Executor {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: ForecastConfig,
        store: CacheStore,
        paths: AppPaths,
        llm: LlmClient,
        weather: WeatherSource,
        geocode: GeocodeSource,
        alerts: AlertSource,
        concurrency: usize,
        force: bool,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            config,
            store,
            paths,
            llm,
            weather,
            geocode,
            alerts,
            concurrency: concurrency.max(1),
            force,
            cancel,
        }
    }

    /// Resolve every target's settings up front.
    ///
    /// # Errors
    ///
    /// Any config error (bad units, unknown ensemble model, disallowed
    /// impact provider) is raised here, before any task executes.
    pub fn plan(&self) -> Result<Vec<ForecastTarget>> {
        let mut targets = Vec::new();

        for location in &self.config.locations {
            let settings = SettingsBag::resolve(&self.config, None, Some(location))?;
            validate_impact_provider(&settings)?;
            targets.push(ForecastTarget {
                name: location.name.clone(),
                slug: slugify(&location.name),
                kind: TargetKind::Location,
                settings,
                member_locations: Vec::new(),
            });
        }

        for area in &self.config.areas {
            let settings = SettingsBag::resolve_area(&self.config, area)?;
            validate_impact_provider(&settings)?;
            let kind = match area.mode {
                AreaMode::Area => TargetKind::Area,
                AreaMode::Regional => TargetKind::Regional,
            };
            targets.push(ForecastTarget {
                name: area.name.clone(),
                slug: slugify(&area.name),
                kind,
                settings,
                member_locations: area.locations.clone(),
            });
        }

        Ok(targets)
    }

    /// Execute the full run: plan, gate, fan out, summarize.
    ///
    /// # Errors
    ///
    /// Only configuration errors are returned; per-task failures land in
    /// the outcomes and summary instead.
    pub async fn run(&self) -> Result<(Vec<TaskOutcome>, RunSummary)> {
        let targets = self.plan()?;
        if targets.is_empty() {
            tracing::info!("No locations or areas configured; nothing to do");
            return Ok((Vec::new(), RunSummary::default()));
        }

        let mut gate = RefreshGate::load(&self.paths);
        let now = Utc::now();
        let mut to_run = Vec::new();
        let mut outcomes = Vec::new();

        for target in targets {
            let hash = target_settings_hash(&target.slug, &target.settings);
            if gate.needs_regeneration(
                &target.slug,
                &hash,
                target.settings.refresh_interval_minutes,
                self.force,
                now,
            ) {
                to_run.push((target, hash));
            } else {
                tracing::info!(target = %target.name, "Output is fresh; skipping");
                outcomes.push(TaskOutcome::Skipped {
                    target: target.name.clone(),
                    slug: target.slug.clone(),
                    reason: "output fresh and config unchanged".to_string(),
                });
            }
        }

        let pool = Arc::new(Semaphore::new(self.concurrency));
        let futures: Vec<_> = to_run
            .iter()
            .map(|(target, _)| {
                let pool = Arc::clone(&pool);
                async move {
                    let _permit = pool.acquire().await.expect("pool never closes");
                    self.run_target(target).await
                }
            })
            .collect();
        let ran = futures::future::join_all(futures).await;

        for (outcome, (_, hash)) in ran.into_iter().zip(to_run.iter()) {
            if let TaskOutcome::Rendered(result) = &outcome {
                gate.mark_rendered(&result.slug, hash, result.issued_at);
            }
            outcomes.push(outcome);
        }
        if let Err(e) = gate.save() {
            tracing::warn!(error = %e, "Failed to persist run state");
        }

        let mut summary = RunSummary::default();
        for outcome in &outcomes {
            summary.absorb(outcome);
        }
        Ok((outcomes, summary))
    }

    /// Drive one target through the state machine.
    async fn run_target(&self, target: &ForecastTarget) -> TaskOutcome {
        if self.cancel.is_cancelled() {
            return TaskOutcome::Skipped {
                target: target.name.clone(),
                slug: target.slug.clone(),
                reason: "run cancelled".to_string(),
            };
        }

        let mut state = TaskState::Pending;
        transition(target, &mut state, TaskState::Acquiring);

        let outcome = match target.kind {
            TargetKind::Location => self.run_location_task(target, &mut state).await,
            TargetKind::Area | TargetKind::Regional => {
                self.run_area_task(target, &mut state).await
            }
        };

        match outcome {
            Ok(result) => TaskOutcome::Rendered(Box::new(result)),
            Err(error) => {
                transition(target, &mut state, TaskState::Failed);
                tracing::error!(target = %target.name, error = %error, "Task failed");
                TaskOutcome::Failed {
                    target: target.name.clone(),
                    slug: target.slug.clone(),
                    error,
                }
            }
        }
    }

    async fn run_location_task(
        &self,
        target: &ForecastTarget,
        state: &mut TaskState,
    ) -> Result<ForecastResult> {
        let acquired = self
            .acquire_location(target, &target.name, &target.slug, target.settings.impact_context)
            .await?;
        self.finish_task(target, state, acquired).await
    }

    async fn run_area_task(
        &self,
        target: &ForecastTarget,
        state: &mut TaskState,
    ) -> Result<ForecastResult> {
        let mut payloads = Vec::new();
        for location_name in &target.member_locations {
            if self.cancel.is_cancelled() {
                break;
            }
            let cache_label = format!("{}__{}", target.slug, slugify(location_name));
            match self
                .acquire_location(target, location_name, &cache_label, false)
                .await
            {
                Ok(acquired) => payloads.push(acquired),
                Err(e) => {
                    // One bad member location does not sink the area.
                    tracing::warn!(
                        area = %target.name,
                        location = %location_name,
                        error = %e,
                        "Skipping representative location"
                    );
                }
            }
        }

        if payloads.is_empty() {
            return Err(WxError::FetchMalformed {
                source_name: "area-collection".to_string(),
                message: format!("no valid location data for area '{}'", target.name),
            });
        }

        // Impact context covers the area as a whole, fetched once.
        let impact_context = if target.settings.impact_context {
            let timezone = payloads[0].geocode.timezone.clone();
            let impact = ImpactSource::new(&self.llm, &self.store)
                .fetch(&ImpactRequest {
                    name: target.name.clone(),
                    context_type: target.kind.context_type(),
                    forecast_days: target.settings.forecast_days,
                    timezone_name: timezone,
                    model: target.settings.impact_model.clone(),
                })
                .await;
            if impact.is_empty() {
                None
            } else {
                Some(impact.content)
            }
        } else {
            None
        };

        let combined = AcquiredArea::combine(target, payloads, impact_context, &self.store);
        self.finish_area_task(target, state, combined).await
    }

    /// ACQUIRING for one location: geocode, then weather + alerts + impact
    /// concurrently.
    async fn acquire_location(
        &self,
        target: &ForecastTarget,
        location_name: &str,
        cache_label: &str,
        include_impact: bool,
    ) -> Result<AcquiredLocation> {
        let settings = &target.settings;
        let geocode = self.geocode.resolve(location_name).await?;
        let timezone = geocode.timezone.clone();

        let weather_request =
            ForecastRequest::from_settings(settings, geocode.latitude, geocode.longitude, &timezone);

        let impact_source = ImpactSource::new(&self.llm, &self.store);
        let impact_request = ImpactRequest {
            name: target.name.clone(),
            context_type: target.kind.context_type(),
            forecast_days: settings.forecast_days,
            timezone_name: timezone.clone(),
            model: settings.impact_model.clone(),
        };

        let (weather, alerts, impact) = tokio::join!(
            self.weather.fetch(&weather_request),
            self.alerts.fetch(
                geocode.latitude,
                geocode.longitude,
                geocode.country_code.as_deref(),
            ),
            async {
                if include_impact {
                    Some(impact_source.fetch(&impact_request).await)
                } else {
                    None
                }
            },
        );
        let weather = weather?;

        Ok(AcquiredLocation {
            name: location_name.to_string(),
            cache_label: cache_label.to_string(),
            geocode,
            raw_forecast: weather.raw,
            stale_forecast: weather.stale,
            alerts,
            impact_context: impact
                .filter(|ctx| !ctx.is_empty())
                .map(|ctx| ctx.content),
        })
    }

    /// PROCESSED + GENERATING + translation for a location target.
    async fn finish_task(
        &self,
        target: &ForecastTarget,
        state: &mut TaskState,
        acquired: AcquiredLocation,
    ) -> Result<ForecastResult> {
        let settings = &target.settings;
        let timezone = acquired.geocode.timezone.clone();

        let days = build_processed_days(&acquired.raw_forecast, &timezone, settings);
        if days.is_empty() {
            return Err(WxError::FetchMalformed {
                source_name: "open-meteo".to_string(),
                message: format!("no processed data produced for '{}'", target.name),
            });
        }
        self.cache_processed(&acquired.cache_label, &days);
        transition(target, state, TaskState::Processed);

        let preview = dataset_preview(&days, &acquired.alerts);
        let formatted = format_dataset_text(&days, &acquired.alerts, &settings.units);

        let local_hour = local_now(&timezone).hour();
        let short_instr = prompts::short_period_instruction(&days[0].day_label, local_hour);
        let impact_instr = if acquired.impact_context.is_some() {
            prompts::impact_instruction()
        } else {
            ""
        };

        let system_prompt = prompts::spot_system_prompt(&settings.units);
        let user_prompt = prompts::spot_user_prompt(&prompts::SpotPromptParams {
            formatted_dataset: &formatted,
            location_name: &target.name,
            latitude: acquired.geocode.latitude,
            longitude: acquired.geocode.longitude,
            season: current_season(acquired.geocode.latitude),
            wordiness: settings.wordiness,
            extra_instructions: vec![short_instr, impact_instr],
            impact_context: acquired.impact_context.as_deref().unwrap_or(""),
        });

        transition(target, state, TaskState::Generating);
        self.generate_and_render(
            target,
            state,
            &system_prompt,
            &user_prompt,
            preview,
            acquired.stale_forecast,
            acquired.impact_context,
        )
        .await
    }

    /// PROCESSED + GENERATING + translation for an area target.
    async fn finish_area_task(
        &self,
        target: &ForecastTarget,
        state: &mut TaskState,
        combined: AcquiredArea,
    ) -> Result<ForecastResult> {
        let settings = &target.settings;
        transition(target, state, TaskState::Processed);

        let system_prompt = match target.kind {
            TargetKind::Regional => prompts::regional_system_prompt(&settings.units),
            _ => prompts::area_system_prompt(&settings.units),
        };
        let timezone = combined.timezone.clone();
        let local_hour = local_now(&timezone).hour();
        let short_instr =
            prompts::short_period_instruction(&combined.first_day_label, local_hour);
        let impact_instr = if combined.impact_context.is_some() {
            prompts::impact_instruction()
        } else {
            ""
        };

        let params = prompts::AreaPromptParams {
            formatted_dataset: &combined.formatted_dataset,
            area_name: &target.name,
            location_names: combined
                .location_names
                .iter()
                .map(String::as_str)
                .collect(),
            wordiness: settings.wordiness,
            extra_instructions: vec![short_instr, impact_instr],
            impact_context: combined.impact_context.as_deref().unwrap_or(""),
        };
        let user_prompt = match target.kind {
            TargetKind::Regional => prompts::regional_user_prompt(&params),
            _ => prompts::area_user_prompt(&params),
        };

        transition(target, state, TaskState::Generating);
        self.generate_and_render(
            target,
            state,
            &system_prompt,
            &user_prompt,
            combined.preview,
            combined.stale,
            combined.impact_context,
        )
        .await
    }

    /// GENERATING: call the provider, degrading to the preview text on
    /// any generation error; then the optional translation sub-step.
    #[allow(clippy::too_many_arguments)]
    async fn generate_and_render(
        &self,
        target: &ForecastTarget,
        state: &mut TaskState,
        system_prompt: &str,
        user_prompt: &str,
        preview: String,
        stale_data: bool,
        impact_context: Option<String>,
    ) -> Result<ForecastResult> {
        let settings = &target.settings;
        self.store.snapshot_prompt(
            &format!("{}_forecast", target.slug),
            &format!("SYSTEM:\n{system_prompt}\n\nUSER:\n{user_prompt}"),
        );

        let model = select_model(None, settings.llm_model.as_deref());
        let mut provider_name = None;
        let mut model_name = None;
        let mut cost_cents = None;

        let generated = match resolve_provider(&model, LlmKind::Forecast) {
            Ok(handle) => {
                let mut request = GenerationRequest::new(system_prompt, user_prompt);
                request.reasoning = settings.reasoning;
                tracing::info!(
                    target = %target.name,
                    model = %handle.model,
                    provider = handle.family.name(),
                    "Requesting forecast text"
                );
                provider_name = Some(handle.family.name().to_string());
                model_name = Some(handle.model.clone());
                match self.llm.generate(&handle, &request).await {
                    Ok(output) => {
                        cost_cents = output.cost_cents;
                        Some(output.text)
                    }
                    Err(e) => {
                        tracing::warn!(
                            target = %target.name,
                            error = %e,
                            "Generation failed; using dataset preview fallback"
                        );
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(target = %target.name, error = %e, "Provider resolution failed");
                None
            }
        };

        let (text, source, degraded) = match generated {
            Some(text) if !text.trim().is_empty() => (text, ResultSource::Generated, false),
            _ => (preview, ResultSource::DegradedFallback, true),
        };

        // Translation runs only after a primary result exists; its own
        // failure never reverts the primary text.
        let (translation, translation_failed) = if settings.wants_translation() {
            self.translate(target, &text).await
        } else {
            (None, false)
        };

        transition(target, state, TaskState::Rendered);
        Ok(ForecastResult {
            target: target.name.clone(),
            slug: target.slug.clone(),
            text,
            source,
            degraded: degraded || stale_data,
            provider: provider_name,
            model: model_name,
            cost_cents,
            translation,
            translation_failed,
            impact_context,
            issued_at: Utc::now(),
        })
    }

    async fn translate(&self, target: &ForecastTarget, text: &str) -> (Option<String>, bool) {
        let settings = &target.settings;
        let Some(language) = settings.translation_language.as_deref() else {
            return (None, false);
        };

        let model = select_model(
            settings.translation_model.as_deref(),
            settings.llm_model.as_deref(),
        );
        let handle = match resolve_provider(&model, LlmKind::Translation) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(target = %target.name, error = %e, "Translation provider unusable");
                return (None, true);
            }
        };

        tracing::info!(target = %target.name, language, model = %handle.model, "Translating forecast");
        let request = GenerationRequest::new(
            prompts::translation_system_prompt(language),
            prompts::translation_user_prompt(text),
        );
        match self.llm.generate(&handle, &request).await {
            Ok(output) => (Some(output.text), false),
            Err(e) => {
                tracing::warn!(target = %target.name, error = %e, "Translation failed");
                (None, true)
            }
        }
    }

    fn cache_processed(&self, cache_label: &str, days: &[ProcessedDay]) {
        if let Err(e) = self.store.put(Namespace::Processed, cache_label, &days) {
            tracing::warn!(label = cache_label, error = %e, "Failed to cache processed dataset");
        }
    }
}

fn transition(target: &ForecastTarget, state: &mut TaskState, next: TaskState) {
    tracing::debug!(target = %target.name, from = ?state, to = ?next, "Task transition");
    *state = next;
}

/// Validate the impact provider chain while resolving settings, so a
/// disallowed provider fails before any task runs.
fn validate_impact_provider(settings: &SettingsBag) -> Result<()> {
    if !settings.impact_context {
        return Ok(());
    }
    let model = select_model(None, settings.impact_model.as_deref());
    resolve_provider(&model, LlmKind::Impact).map(|_| ())
}

/// Everything gathered for one location during ACQUIRING.
struct AcquiredLocation {
    name: String,
    cache_label: String,
    geocode: GeocodeResult,
    raw_forecast: serde_json::Value,
    stale_forecast: bool,
    alerts: Vec<AlertSummary>,
    impact_context: Option<String>,
}

/// Aggregated member-location data for an area target.
struct AcquiredArea {
    formatted_dataset: String,
    preview: String,
    first_day_label: String,
    timezone: String,
    location_names: Vec<String>,
    impact_context: Option<String>,
    stale: bool,
}

impl AcquiredArea {
    fn combine(
        target: &ForecastTarget,
        payloads: Vec<AcquiredLocation>,
        impact_context: Option<String>,
        store: &CacheStore,
    ) -> Self {
        let settings = &target.settings;
        let timezone = payloads
            .first()
            .map_or_else(|| "UTC".to_string(), |p| p.geocode.timezone.clone());
        let stale = payloads.iter().any(|p| p.stale_forecast);

        let mut location_names = Vec::new();
        let mut blocks = Vec::new();
        let mut previews = vec![format!("**Area dataset preview for {}**", target.name)];
        let mut first_day_label = String::new();

        for payload in &payloads {
            let days =
                build_processed_days(&payload.raw_forecast, &payload.geocode.timezone, settings);
            if days.is_empty() {
                continue;
            }
            if let Err(e) = store.put(Namespace::Processed, &payload.cache_label, &days) {
                tracing::warn!(label = %payload.cache_label, error = %e, "Failed to cache processed dataset");
            }
            if first_day_label.is_empty() {
                first_day_label = days[0].day_label.clone();
            }
            let text = format_dataset_text(&days, &payload.alerts, &settings.units);
            previews.push(format!(
                "- {}\n{}",
                payload.name,
                dataset_preview(&days, &payload.alerts)
            ));
            blocks.push((payload.name.clone(), text));
            location_names.push(payload.name.clone());
        }

        Self {
            formatted_dataset: format_area_dataset_text(&target.name, &blocks),
            preview: previews.join("\n"),
            first_day_label,
            timezone,
            location_names,
            impact_context,
            stale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_and_exit_codes() {
        let mut summary = RunSummary::default();

        summary.absorb(&TaskOutcome::Rendered(Box::new(ForecastResult {
            target: "A".into(),
            slug: "a".into(),
            text: "ok".into(),
            source: ResultSource::Generated,
            degraded: false,
            provider: None,
            model: None,
            cost_cents: Some(1.5),
            translation: None,
            translation_failed: false,
            impact_context: None,
            issued_at: Utc::now(),
        })));
        summary.absorb(&TaskOutcome::Rendered(Box::new(ForecastResult {
            target: "B".into(),
            slug: "b".into(),
            text: "preview".into(),
            source: ResultSource::DegradedFallback,
            degraded: true,
            provider: None,
            model: None,
            cost_cents: None,
            translation: None,
            translation_failed: false,
            impact_context: None,
            issued_at: Utc::now(),
        })));

        assert_eq!(summary.generated, 1);
        assert_eq!(summary.degraded, 1);
        // Degraded results are soft successes.
        assert_eq!(summary.exit_code(), crate::error::ExitCode::Success);

        summary.absorb(&TaskOutcome::Failed {
            target: "C".into(),
            slug: "c".into(),
            error: WxError::GeocodeNotFound("C".into()),
        });
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.exit_code(), crate::error::ExitCode::GeneralError);
    }

    #[test]
    fn cancel_flag_round_trip() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn impact_validation_rejects_openrouter_models() {
        let mut settings =
            SettingsBag::resolve(&ForecastConfig::default(), None, None).unwrap();
        settings.impact_context = true;
        settings.impact_model = Some("or:deepseek/deepseek-r1".into());
        assert!(validate_impact_provider(&settings).is_err());

        settings.impact_model = Some("gemini-3-flash-preview".into());
        assert!(validate_impact_provider(&settings).is_ok());

        settings.impact_context = false;
        settings.impact_model = Some("or:deepseek/deepseek-r1".into());
        assert!(validate_impact_provider(&settings).is_ok());
    }
}
