//! Impact-context lookups with date-keyed caching.
//!
//! Context is generated through a web-search-capable LLM call and cached
//! per (local date, context model, target slug, context type). Context
//! is supplementary: every failure path degrades to an empty context and
//! the forecast proceeds without it.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::providers::{LlmClient, LlmKind, resolve_provider, select_model};
use crate::storage::{CacheStore, Namespace};
use crate::util::{local_date_string, local_now, slugify};

/// The four section headings every context answer must carry.
const SECTION_HEADINGS: &[&str] = &[
    "Existing Vulnerabilities",
    "Weather Impact Thresholds",
    "Exposed Populations and Assets",
    "Upcoming Events",
];

/// Only events inside this window are allowed into the context.
const EVENT_LOOKAHEAD_DAYS: i64 = 10;

/// What kind of target the context is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextType {
    Location,
    Area,
    Regional,
}

impl ContextType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Area => "area",
            Self::Regional => "regional",
        }
    }
}

/// Parameters for one impact-context lookup.
#[derive(Debug, Clone)]
pub struct ImpactRequest {
    pub name: String,
    pub context_type: ContextType,
    pub forecast_days: u32,
    pub timezone_name: String,
    /// Context model selector from settings, if any.
    pub model: Option<String>,
}

/// Cached or freshly generated context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactContext {
    pub content: String,
    pub from_cache: bool,
    pub cost_cents: Option<f64>,
}

impl ImpactContext {
    const fn empty() -> Self {
        Self {
            content: String::new(),
            from_cache: false,
            cost_cents: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Impact-context source bound to a cache store and the LLM client.
pub struct ImpactSource<'a> {
    llm: &'a LlmClient,
    store: &'a CacheStore,
}

impl<'a> ImpactSource<'a> {
    #[must_use]
    pub const fn new(llm: &'a LlmClient, store: &'a CacheStore) -> Self {
        Self { llm, store }
    }

    /// Retrieve or generate context for a target.
    ///
    /// Checks the date-keyed cache first; on a miss, generates through
    /// the impact provider and stores the result under today's local
    /// date. Never fails: an unusable provider or empty answer returns
    /// an empty context.
    pub async fn fetch(&self, request: &ImpactRequest) -> ImpactContext {
        self.store.sweep(Namespace::Impact);

        let model = select_model(None, request.model.as_deref());
        let local_date = local_date_string(&request.timezone_name);
        let key = cache_key(&local_date, request.context_type, &request.name, &model);

        if let Some(entry) = self
            .store
            .get_for_date::<String>(Namespace::Impact, &key, &local_date)
        {
            tracing::info!(name = %request.name, "Using cached impact context");
            return ImpactContext {
                content: entry.payload,
                from_cache: true,
                cost_cents: None,
            };
        }

        // Resolution was validated at startup; re-check defensively since
        // a per-target override may differ.
        let handle = match resolve_provider(&model, LlmKind::Impact) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(name = %request.name, error = %e, "Impact context provider unusable");
                return ImpactContext::empty();
            }
        };

        let prompt = build_context_prompt(request);
        let content = match self.llm.generate_with_search(&handle, &prompt).await {
            Ok(output) => {
                let cleaned = clean_context_text(&output.text);
                if cleaned.is_empty() {
                    tracing::info!(name = %request.name, "Impact context unavailable; continuing without it");
                    return ImpactContext::empty();
                }
                tracing::info!(
                    name = %request.name,
                    chars = cleaned.len(),
                    "Generated impact context"
                );
                ImpactContext {
                    content: cleaned,
                    from_cache: false,
                    cost_cents: output.cost_cents,
                }
            }
            Err(e) => {
                tracing::warn!(name = %request.name, error = %e, "Impact context generation failed; continuing without it");
                return ImpactContext::empty();
            }
        };

        let params = serde_json::json!({
            "name": request.name,
            "context_type": request.context_type.as_str(),
            "forecast_days": request.forecast_days,
            "context_llm": model,
        });
        if let Err(e) = self.store.put_with_params(
            Namespace::Impact,
            &key,
            &content.content,
            params,
            Some(local_date),
        ) {
            tracing::warn!(name = %request.name, error = %e, "Failed to write impact cache");
        }
        content
    }
}

/// Deterministic cache key over (date, type, slug, model).
#[must_use]
pub fn cache_key(local_date: &str, context_type: ContextType, name: &str, model: &str) -> String {
    format!(
        "{}_{}_{}__{}",
        local_date,
        context_type.as_str(),
        slugify(name),
        slugify(model)
    )
}

fn build_context_prompt(request: &ImpactRequest) -> String {
    let now = local_now(&request.timezone_name);
    let start_iso = now.format("%Y-%m-%d").to_string();
    let end_iso = (now + chrono::Duration::days(i64::from(request.forecast_days)))
        .format("%Y-%m-%d")
        .to_string();
    let events_end_iso = (now + chrono::Duration::days(EVENT_LOOKAHEAD_DAYS))
        .format("%Y-%m-%d")
        .to_string();
    let target_phrase = match request.context_type {
        ContextType::Location => "a location",
        ContextType::Area | ContextType::Regional => "an area",
    };

    format!(
        r"Another assistant will soon prepare a {days}-day impact-based weather forecast and associated warnings for {name} ({target_phrase}).

To provide context for that forecast, identify and list all relevant contextual information that could influence weather impacts, including:

• Current national and local conditions and vulnerabilities (e.g., recent flooding or landslides, ongoing drought, damaged infrastructure, health outbreaks, power or water supply issues).

• Weather impact thresholds specific to this location (IMPORTANT): known rainfall amounts (in mm), wind speeds (in km/h), or other thresholds that historically trigger impacts such as flooding, landslides, road closures, power outages, or structural damage here, plus vulnerability factors affecting those thresholds.

• Upcoming events that may increase exposure or vulnerability. Only truly major events with large public attendance, occurring at the location (or within 20 km), and only events occurring TODAY or within the next {lookahead} days (through {events_end}). Every listed event MUST carry its exact date; omit any event whose exact date you cannot find.

• Key vulnerable groups and assets (e.g., informal settlements, flood-prone neighbourhoods, critical infrastructure, tourism areas, coastal communities).

Use only recent, publicly available information covering {start} through {end} for vulnerabilities/thresholds/exposures.

Formatting requirements:

• Begin immediately with the first heading; no introduction, summaries, or sign-offs.
• Include ALL four headings below, even when a section has no items (then add a single bullet: '• No relevant items found.').
• Use Markdown level-3 headings in the exact form:
    ### Existing Vulnerabilities
    ### Weather Impact Thresholds
    ### Exposed Populations and Assets
    ### Upcoming Events
• Under each heading, use concise bullet lines with 1-2 sentences on why each item matters for the next {days} days.

IMPORTANT: Provide only the structured context as plain text. Do NOT include URLs, web links, or citations. Do not offer to draft the forecast or ask whether to proceed.",
        days = request.forecast_days,
        name = request.name,
        target_phrase = target_phrase,
        lookahead = EVENT_LOOKAHEAD_DAYS,
        events_end = events_end_iso,
        start = start_iso,
        end = end_iso,
    )
}

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^\)]+\)").expect("static regex"));
static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://|www\.)\S+").expect("static regex"));
static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("static regex"));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// Strip links, chatter, and formatting glitches from context output,
/// then force the known section headings into `###` form.
#[must_use]
pub fn clean_context_text(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let mut cleaned = MARKDOWN_LINK.replace_all(text, "$1").into_owned();
    cleaned = BARE_URL.replace_all(&cleaned, "").into_owned();
    cleaned = SPACE_RUNS.replace_all(&cleaned, " ").into_owned();
    cleaned = BLANK_RUNS.replace_all(&cleaned, "\n\n").into_owned();

    for heading in SECTION_HEADINGS {
        let pattern = Regex::new(&format!(
            r"(?mi)^\s*(?:#{{1,6}}\s*)?(?:\*\*|__)?{}(?:\*\*|__)?\s*:?",
            regex::escape(heading)
        ))
        .expect("heading regex");
        cleaned = pattern
            .replace_all(&cleaned, format!("### {heading}"))
            .into_owned();
    }

    // Drop any intro chatter before the first heading.
    if let Some(idx) = cleaned.find("### ")
        && idx > 0
    {
        cleaned = cleaned[idx..].to_string();
    }

    cleaned.trim().to_string()
}
