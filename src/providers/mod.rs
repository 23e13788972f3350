//! LLM provider routing and dispatch.
//!
//! Model selector strings resolve to a [`ProviderHandle`] — the provider
//! family, concrete model id, and required credential — through one
//! resolution function, instead of string comparisons scattered through
//! the pipeline. All calls go through [`LlmClient::generate`]; the
//! request/response shapes of each vendor stay internal to the family
//! adapters.

pub mod gemini;
pub mod openai;
pub mod pricing;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::Semaphore;

use crate::config::ReasoningLevel;
use crate::error::{Result, WxError};

/// Hard-coded fallback when nothing selects a model.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Environment variable overriding the default model for a whole run.
pub const DEFAULT_MODEL_ENV: &str = "WXGEN_DEFAULT_LLM";

/// Max simultaneous outbound calls per provider family.
const FAMILY_CONCURRENCY: usize = 2;

/// What a resolved model is being used for. Impact-context calls are
/// restricted to providers with a web-search-capable API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmKind {
    Forecast,
    Translation,
    Impact,
}

impl LlmKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forecast => "forecast",
            Self::Translation => "translation",
            Self::Impact => "impact",
        }
    }
}

/// Supported LLM provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderFamily {
    OpenAi,
    Gemini,
    OpenRouter,
}

impl ProviderFamily {
    pub const ALL: &'static [Self] = &[Self::OpenAi, Self::Gemini, Self::OpenRouter];

    /// Display name for logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
        }
    }

    /// Environment variable holding this family's API key.
    #[must_use]
    pub const fn credential_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

/// Reasoning parameter in the shape the family's API expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasoningParam {
    /// OpenAI `reasoning_effort` value.
    Effort(&'static str),
    /// OpenRouter `reasoning: {effort}` extra body.
    ExtraBodyEffort(&'static str),
    /// Gemini `thinking_level` value.
    ThinkingLevel(&'static str),
}

/// Resolved provider capability handle, read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderHandle {
    pub family: ProviderFamily,
    pub model: String,
}

impl ProviderHandle {
    /// Name of the credential this handle requires.
    #[must_use]
    pub const fn credential_env(&self) -> &'static str {
        self.family.credential_env()
    }

    /// Map a reasoning level through this family's parameter table.
    ///
    /// Families without reasoning support return `None` and the setting
    /// is silently ignored.
    #[must_use]
    pub const fn reasoning_param(&self, level: ReasoningLevel) -> Option<ReasoningParam> {
        match self.family {
            ProviderFamily::OpenAi => match level {
                ReasoningLevel::Off => None,
                ReasoningLevel::Minimal => Some(ReasoningParam::Effort("minimal")),
                ReasoningLevel::Low => Some(ReasoningParam::Effort("low")),
                ReasoningLevel::Medium | ReasoningLevel::Auto => {
                    Some(ReasoningParam::Effort("medium"))
                }
                ReasoningLevel::High => Some(ReasoningParam::Effort("high")),
            },
            ProviderFamily::OpenRouter => match level {
                ReasoningLevel::Off | ReasoningLevel::Auto => None,
                ReasoningLevel::Minimal | ReasoningLevel::Low => {
                    Some(ReasoningParam::ExtraBodyEffort("low"))
                }
                ReasoningLevel::Medium => Some(ReasoningParam::ExtraBodyEffort("medium")),
                ReasoningLevel::High => Some(ReasoningParam::ExtraBodyEffort("high")),
            },
            ProviderFamily::Gemini => match level {
                ReasoningLevel::Off | ReasoningLevel::Auto => None,
                ReasoningLevel::Minimal | ReasoningLevel::Low => {
                    Some(ReasoningParam::ThinkingLevel("low"))
                }
                ReasoningLevel::Medium => Some(ReasoningParam::ThinkingLevel("medium")),
                ReasoningLevel::High => Some(ReasoningParam::ThinkingLevel("high")),
            },
        }
    }
}

/// Resolve a model selector string into a provider handle.
///
/// Prefix rules: `or:` forces OpenRouter; `gemini-*` and `google/gemini-*`
/// route to Gemini; `gpt-*` and `o<digit>…` route to OpenAI; anything
/// unmatched falls back to OpenRouter and requires its credential.
///
/// # Errors
///
/// Impact-context resolution is restricted to Gemini and OpenAI; any
/// other family for that kind is a config error at validation time.
pub fn resolve_provider(candidate: &str, kind: LlmKind) -> Result<ProviderHandle> {
    let trimmed = candidate.trim();
    let lowered = trimmed.to_lowercase();

    let handle = if let Some(rest) = trimmed.strip_prefix("or:") {
        ProviderHandle {
            family: ProviderFamily::OpenRouter,
            model: rest.trim().to_string(),
        }
    } else if lowered.starts_with("gemini-") || lowered.starts_with("google/gemini-") {
        // Accept the OpenRouter-style "google/" prefix and strip it.
        let model = trimmed
            .strip_prefix("google/")
            .unwrap_or(trimmed)
            .to_string();
        ProviderHandle {
            family: ProviderFamily::Gemini,
            model,
        }
    } else if lowered.starts_with("gpt-") || is_openai_o_series(&lowered) {
        ProviderHandle {
            family: ProviderFamily::OpenAi,
            model: trimmed.to_string(),
        }
    } else {
        ProviderHandle {
            family: ProviderFamily::OpenRouter,
            model: trimmed.to_string(),
        }
    };

    if kind == LlmKind::Impact
        && !matches!(
            handle.family,
            ProviderFamily::Gemini | ProviderFamily::OpenAi
        )
    {
        return Err(WxError::DisallowedProvider {
            provider: handle.family.name().to_string(),
            kind: kind.as_str().to_string(),
        });
    }

    Ok(handle)
}

/// Apply model selection precedence: explicit call-site override, then
/// the resolved settings value, then the process-wide env override, then
/// the hard-coded fallback.
#[must_use]
pub fn select_model(call_site: Option<&str>, settings: Option<&str>) -> String {
    call_site
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .or_else(|| {
            settings
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        })
        .or_else(|| {
            std::env::var(DEFAULT_MODEL_ENV)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

/// API keys resolved once at startup, read-only during execution.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    keys: HashMap<ProviderFamily, String>,
}

impl Credentials {
    /// Read all provider keys from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let mut keys = HashMap::new();
        for family in ProviderFamily::ALL {
            if let Ok(value) = std::env::var(family.credential_env())
                && !value.trim().is_empty()
            {
                keys.insert(*family, value);
            }
        }
        Self { keys }
    }

    /// Build from explicit keys (tests).
    #[must_use]
    pub fn from_keys(keys: HashMap<ProviderFamily, String>) -> Self {
        Self { keys }
    }

    /// Key for a family.
    ///
    /// # Errors
    ///
    /// `CredentialMissing` when the family's env var was not set — fatal
    /// only for tasks that need that family.
    pub fn key_for(&self, family: ProviderFamily) -> Result<&str> {
        self.keys
            .get(&family)
            .map(String::as_str)
            .ok_or_else(|| WxError::CredentialMissing {
                provider: family.name().to_string(),
                env_var: family.credential_env().to_string(),
            })
    }
}

/// One generation request, provider-agnostic.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub reasoning: ReasoningLevel,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(system_prompt: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
            reasoning: ReasoningLevel::Auto,
            max_tokens: 8000,
            temperature: 0.2,
        }
    }
}

/// Token usage reported by a provider, when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Successful generation output.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub text: String,
    pub usage: Option<GenerationUsage>,
    /// Estimated cost in USD cents, when the model is in the price table.
    pub cost_cents: Option<f64>,
}

/// Shared client for all provider families.
///
/// Holds the HTTP client, the startup-resolved credentials, and a
/// per-family semaphore throttling simultaneous outbound calls.
pub struct LlmClient {
    http: reqwest::Client,
    credentials: Credentials,
    limiters: HashMap<ProviderFamily, Arc<Semaphore>>,
    base_urls: HashMap<ProviderFamily, String>,
}

impl LlmClient {
    /// Build a client with default endpoints.
    ///
    /// # Errors
    ///
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn new(credentials: Credentials) -> Result<Self> {
        let http = crate::core::http::build_client(crate::core::http::LLM_TIMEOUT)?;
        let mut limiters = HashMap::new();
        let mut base_urls = HashMap::new();
        for family in ProviderFamily::ALL {
            limiters.insert(*family, Arc::new(Semaphore::new(FAMILY_CONCURRENCY)));
            base_urls.insert(*family, default_base_url(*family).to_string());
        }
        Ok(Self {
            http,
            credentials,
            limiters,
            base_urls,
        })
    }

    /// Point one family at a different endpoint (tests).
    #[must_use]
    pub fn with_base_url(mut self, family: ProviderFamily, url: impl Into<String>) -> Self {
        self.base_urls.insert(family, url.into());
        self
    }

    pub(crate) fn base_url(&self, family: ProviderFamily) -> &str {
        self.base_urls
            .get(&family)
            .map_or_else(|| default_base_url(family), String::as_str)
    }

    pub(crate) const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Generate text through the handle's family adapter.
    ///
    /// Acquires the family's concurrency permit first so simultaneous
    /// tasks respect upstream rate limits.
    ///
    /// # Errors
    ///
    /// Credential and generation errors; callers treat all of them as
    /// degradable, never fatal for the run.
    pub async fn generate(
        &self,
        handle: &ProviderHandle,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput> {
        let api_key = self.credentials.key_for(handle.family)?.to_string();
        let _permit = self.acquire_permit(handle.family).await?;

        tracing::debug!(
            provider = handle.family.name(),
            model = %handle.model,
            "Dispatching generation request"
        );

        let output = match handle.family {
            ProviderFamily::Gemini => gemini::generate(self, handle, request, &api_key).await?,
            ProviderFamily::OpenAi | ProviderFamily::OpenRouter => {
                openai::generate(self, handle, request, &api_key).await?
            }
        };

        if let Some(usage) = output.usage {
            tracing::info!(
                provider = handle.family.name(),
                model = %handle.model,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                cost_cents = output.cost_cents.unwrap_or(0.0),
                "LLM usage"
            );
        }
        Ok(output)
    }

    /// Run an impact-context lookup through a web-search-capable API.
    ///
    /// # Errors
    ///
    /// Same classification as [`Self::generate`].
    pub async fn generate_with_search(
        &self,
        handle: &ProviderHandle,
        prompt: &str,
    ) -> Result<GenerationOutput> {
        let api_key = self.credentials.key_for(handle.family)?.to_string();
        let _permit = self.acquire_permit(handle.family).await?;

        match handle.family {
            ProviderFamily::Gemini => gemini::search_generate(self, handle, prompt, &api_key).await,
            ProviderFamily::OpenAi => openai::search_generate(self, handle, prompt, &api_key).await,
            ProviderFamily::OpenRouter => Err(WxError::DisallowedProvider {
                provider: handle.family.name().to_string(),
                kind: LlmKind::Impact.as_str().to_string(),
            }),
        }
    }

    async fn acquire_permit(
        &self,
        family: ProviderFamily,
    ) -> Result<tokio::sync::OwnedSemaphorePermit> {
        let limiter = self
            .limiters
            .get(&family)
            .cloned()
            .ok_or_else(|| WxError::Other(anyhow::anyhow!("no limiter for {}", family.name())))?;
        limiter
            .acquire_owned()
            .await
            .map_err(|e| WxError::Other(anyhow::anyhow!("limiter closed: {e}")))
    }
}

const fn default_base_url(family: ProviderFamily) -> &'static str {
    match family {
        ProviderFamily::OpenAi => "https://api.openai.com/v1",
        ProviderFamily::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        ProviderFamily::OpenRouter => "https://openrouter.ai/api/v1",
    }
}

fn is_openai_o_series(lowered: &str) -> bool {
    let mut chars = lowered.chars();
    chars.next() == Some('o') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex"));
static FIRST_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*.+?\*\*").expect("static regex"));
static ANALYTICAL_LINES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(Let'?s |The instruction says)[^\n]*\n").expect("static regex")
});

/// Strip common "thinking" wrappers from model output.
///
/// Some models emit chain-of-thought before the forecast; this removes
/// `<think>` blocks and analytical preambles ahead of the first bold
/// header, leaving only publishable text.
#[must_use]
pub fn clean_llm_output(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let without_think = THINK_BLOCK.replace_all(text, "");
    let without_think: &str = without_think.as_ref();
    let trimmed_to_header = match FIRST_HEADER.find(without_think) {
        Some(m) => &without_think[m.start()..],
        None => without_think,
    };
    ANALYTICAL_LINES
        .replace_all(trimmed_to_header, "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_prefix_forces_openrouter() {
        let handle = resolve_provider("or:openai/gpt-5", LlmKind::Forecast).unwrap();
        assert_eq!(handle.family, ProviderFamily::OpenRouter);
        assert_eq!(handle.model, "openai/gpt-5");
        assert_eq!(handle.credential_env(), "OPENROUTER_API_KEY");
    }

    #[test]
    fn gemini_patterns() {
        let direct = resolve_provider("gemini-3-flash-preview", LlmKind::Forecast).unwrap();
        assert_eq!(direct.family, ProviderFamily::Gemini);

        let prefixed =
            resolve_provider("google/gemini-3-flash-preview", LlmKind::Forecast).unwrap();
        assert_eq!(prefixed.family, ProviderFamily::Gemini);
        assert_eq!(prefixed.model, "gemini-3-flash-preview");
    }

    #[test]
    fn openai_patterns() {
        assert_eq!(
            resolve_provider("gpt-5-mini", LlmKind::Forecast)
                .unwrap()
                .family,
            ProviderFamily::OpenAi
        );
        assert_eq!(
            resolve_provider("o3", LlmKind::Forecast).unwrap().family,
            ProviderFamily::OpenAi
        );
        // "openchat" starts with 'o' but is not an o-series model.
        assert_eq!(
            resolve_provider("openchat-7b", LlmKind::Forecast)
                .unwrap()
                .family,
            ProviderFamily::OpenRouter
        );
    }

    #[test]
    fn unmatched_falls_back_to_openrouter() {
        let handle = resolve_provider("foo-bar-9000", LlmKind::Forecast).unwrap();
        assert_eq!(handle.family, ProviderFamily::OpenRouter);
        assert_eq!(handle.credential_env(), "OPENROUTER_API_KEY");
    }

    #[test]
    fn impact_rejects_openrouter_at_validation() {
        let err = resolve_provider("or:deepseek/deepseek-r1", LlmKind::Impact).unwrap_err();
        assert!(matches!(err, WxError::DisallowedProvider { .. }));

        assert!(resolve_provider("gemini-3-flash-preview", LlmKind::Impact).is_ok());
        assert!(resolve_provider("gpt-5-mini", LlmKind::Impact).is_ok());
    }

    #[test]
    fn selection_precedence() {
        // Call-site override wins over settings.
        assert_eq!(
            select_model(Some("gpt-5-mini"), Some("or:qwen/qwen3")),
            "gpt-5-mini"
        );
        // Settings win over the hard-coded fallback.
        assert_eq!(select_model(None, Some("or:qwen/qwen3")), "or:qwen/qwen3");
        // Blank strings don't count as overrides.
        assert_eq!(select_model(Some("  "), None), DEFAULT_MODEL);
    }

    #[test]
    fn reasoning_mapping_per_family() {
        let openai = ProviderHandle {
            family: ProviderFamily::OpenAi,
            model: "gpt-5-mini".into(),
        };
        assert_eq!(
            openai.reasoning_param(ReasoningLevel::High),
            Some(ReasoningParam::Effort("high"))
        );
        assert_eq!(openai.reasoning_param(ReasoningLevel::Off), None);

        let gemini = ProviderHandle {
            family: ProviderFamily::Gemini,
            model: "gemini-3-flash-preview".into(),
        };
        assert_eq!(
            gemini.reasoning_param(ReasoningLevel::Minimal),
            Some(ReasoningParam::ThinkingLevel("low"))
        );

        let router = ProviderHandle {
            family: ProviderFamily::OpenRouter,
            model: "deepseek/deepseek-r1".into(),
        };
        assert_eq!(
            router.reasoning_param(ReasoningLevel::Medium),
            Some(ReasoningParam::ExtraBodyEffort("medium"))
        );
    }

    #[test]
    fn missing_credential_reports_env_var() {
        let creds = Credentials::from_keys(HashMap::new());
        let err = creds.key_for(ProviderFamily::Gemini).unwrap_err();
        match err {
            WxError::CredentialMissing { env_var, provider } => {
                assert_eq!(env_var, "GEMINI_API_KEY");
                assert_eq!(provider, "gemini");
            }
            other => panic!("expected CredentialMissing, got {other}"),
        }
    }

    #[test]
    fn clean_output_strips_think_blocks() {
        let raw = "<think>reasoning here</think>**Monday**\nSunny.";
        assert_eq!(clean_llm_output(raw), "**Monday**\nSunny.");
    }

    #[test]
    fn clean_output_trims_preamble_before_first_header() {
        let raw = "Let's check the data first.\nSome analysis.\n**Tuesday** Rain easing.";
        assert_eq!(clean_llm_output(raw), "**Tuesday** Rain easing.");
    }

    #[test]
    fn clean_output_passes_plain_text_through() {
        assert_eq!(
            clean_llm_output("Cloudy with drizzle."),
            "Cloudy with drizzle."
        );
    }
}
