//! Error types for wxgen.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors fall into five categories with different blast radii:
//! - **Config**: invalid fields, unknown units, disallowed model choices.
//!   Fatal; raised before any task executes.
//! - **Credential**: a required API key is absent for a resolved provider.
//!   Fatal only for tasks that depend on that provider.
//! - **Fetch**: network/timeout/malformed payloads from the weather,
//!   geocoding, or alert sources. Retried with bounded backoff, then
//!   degraded to the last good cache entry when one exists.
//! - **Generation**: any LLM call failure. Never fails a task; the task
//!   degrades to its dataset-preview fallback text.
//! - **CacheCorruption**: unreadable cache entries. Logged, treated as a
//!   miss, never propagated.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration issues (invalid values, unknown units, bad model ids).
    Config,
    /// Missing or unusable credentials for a resolved provider.
    Credential,
    /// Data-source fetch issues (network, timeout, malformed payload).
    Fetch,
    /// LLM generation issues (provider errors, empty output, timeout).
    Generation,
    /// Cache entries that could not be read back.
    Cache,
    /// Internal errors (bugs, I/O, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Config => "Configuration error",
            Self::Credential => "Credential error",
            Self::Fetch => "Fetch error",
            Self::Generation => "Generation error",
            Self::Cache => "Cache error",
            Self::Internal => "Internal error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the `wxgen` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success (degraded tasks still count as soft successes).
    Success = 0,
    /// At least one task reached FAILED, or an unexpected failure.
    GeneralError = 1,
    /// Configuration or parse errors.
    ConfigError = 3,
    /// Timeout.
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for wxgen operations.
#[derive(Error, Debug)]
pub enum WxError {
    // ==========================================================================
    // Configuration errors (Category: Config)
    // ==========================================================================
    /// Configuration file not found at expected path.
    #[error("config file not found: {path}")]
    ConfigNotFound { path: String },

    /// Error parsing configuration file.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// Invalid value in configuration.
    #[error("invalid config value for '{field}': {message}")]
    ConfigInvalid { field: String, message: String },

    /// Unknown unit token in a unit string.
    #[error("unknown unit '{token}' for '{field}'")]
    UnknownUnit { field: String, token: String },

    /// Unknown ensemble weather model id (fails closed).
    #[error("unknown ensemble model: {0}")]
    UnknownEnsembleModel(String),

    /// Provider not allowed for this kind of call (impact context is
    /// restricted to Gemini and OpenAI).
    #[error("provider {provider} is not allowed for {kind} calls")]
    DisallowedProvider { provider: String, kind: String },

    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    // ==========================================================================
    // Credential errors (Category: Credential)
    // ==========================================================================
    /// Required API key not set for the resolved provider.
    #[error("environment variable {env_var} is required for provider {provider}")]
    CredentialMissing {
        provider: String,
        env_var: String,
    },

    // ==========================================================================
    // Fetch errors (Category: Fetch)
    // ==========================================================================
    /// Request timed out after the configured duration.
    #[error("request timeout after {seconds}s for {source_name}")]
    FetchTimeout { source_name: String, seconds: u64 },

    /// Network-level failure talking to a data source.
    #[error("network error from {source_name}: {message}")]
    FetchNetwork { source_name: String, message: String },

    /// Source returned a non-success HTTP status.
    #[error("{source_name} returned HTTP {status}")]
    FetchStatus { source_name: String, status: u16 },

    /// Source payload could not be parsed or failed validation.
    #[error("malformed payload from {source_name}: {message}")]
    FetchMalformed { source_name: String, message: String },

    /// A place name could not be resolved by any geocoding provider.
    #[error("unable to geocode '{0}'")]
    GeocodeNotFound(String),

    // ==========================================================================
    // Generation errors (Category: Generation)
    // ==========================================================================
    /// LLM provider returned an error response.
    #[error("provider {provider} API error: {message}")]
    GenerationApi {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// LLM call timed out.
    #[error("generation timeout after {seconds}s for {provider}")]
    GenerationTimeout { provider: String, seconds: u64 },

    /// LLM response contained no usable text.
    #[error("provider {provider} returned no usable text")]
    GenerationEmpty { provider: String },

    /// Rate limited by the LLM provider.
    #[error("rate limited by {provider}: {message}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
        message: String,
    },

    // ==========================================================================
    // Cache errors (Category: Cache)
    // ==========================================================================
    /// Cache entry exists but could not be read back. Callers treat this
    /// as a miss; it exists as a variant so sweeps can log it.
    #[error("corrupt cache entry at {path}: {message}")]
    CacheCorrupt { path: String, message: String },

    // ==========================================================================
    // I/O errors (Category: Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ==========================================================================
    // Generic wrapper (Category: Internal)
    // ==========================================================================
    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WxError>;

impl WxError {
    /// Map error to process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::ConfigNotFound { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::UnknownUnit { .. }
            | Self::UnknownEnsembleModel(_)
            | Self::DisallowedProvider { .. }
            | Self::Config(_) => ExitCode::ConfigError,

            Self::FetchTimeout { .. } | Self::GenerationTimeout { .. } => ExitCode::Timeout,

            Self::CredentialMissing { .. }
            | Self::FetchNetwork { .. }
            | Self::FetchStatus { .. }
            | Self::FetchMalformed { .. }
            | Self::GeocodeNotFound(_)
            | Self::GenerationApi { .. }
            | Self::GenerationEmpty { .. }
            | Self::RateLimited { .. }
            | Self::CacheCorrupt { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigNotFound { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::UnknownUnit { .. }
            | Self::UnknownEnsembleModel(_)
            | Self::DisallowedProvider { .. }
            | Self::Config(_) => ErrorCategory::Config,

            Self::CredentialMissing { .. } => ErrorCategory::Credential,

            Self::FetchTimeout { .. }
            | Self::FetchNetwork { .. }
            | Self::FetchStatus { .. }
            | Self::FetchMalformed { .. }
            | Self::GeocodeNotFound(_) => ErrorCategory::Fetch,

            Self::GenerationApi { .. }
            | Self::GenerationTimeout { .. }
            | Self::GenerationEmpty { .. }
            | Self::RateLimited { .. } => ErrorCategory::Generation,

            Self::CacheCorrupt { .. } => ErrorCategory::Cache,

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns whether the error is potentially recoverable by retrying.
    ///
    /// Retryable errors include timeouts, transient network failures,
    /// 5xx statuses, and rate limits (with backoff).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::FetchTimeout { .. }
            | Self::FetchNetwork { .. }
            | Self::GenerationTimeout { .. }
            | Self::RateLimited { .. } => true,
            Self::FetchStatus { status, .. } => *status >= 500,
            Self::GenerationApi { status, .. } => matches!(status, Some(s) if *s >= 500),
            _ => false,
        }
    }

    /// Returns the retry-after duration if this error specifies one.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns true for failures that are fatal before any task runs.
    #[must_use]
    pub const fn is_fatal_at_startup(&self) -> bool {
        matches!(self.category(), ErrorCategory::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_config_exit_code() {
        let err = WxError::UnknownUnit {
            field: "temperature_unit".into(),
            token: "kelvinish".into(),
        };
        assert_eq!(err.exit_code(), ExitCode::ConfigError);
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(err.is_fatal_at_startup());
    }

    #[test]
    fn fetch_timeout_is_retryable() {
        let err = WxError::FetchTimeout {
            source_name: "open-meteo".into(),
            seconds: 30,
        };
        assert!(err.is_retryable());
        assert_eq!(err.exit_code(), ExitCode::Timeout);
    }

    #[test]
    fn server_errors_retryable_client_errors_not() {
        let server = WxError::FetchStatus {
            source_name: "open-meteo".into(),
            status: 503,
        };
        let client = WxError::FetchStatus {
            source_name: "open-meteo".into(),
            status: 404,
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn cache_corruption_is_never_fatal() {
        let err = WxError::CacheCorrupt {
            path: "/tmp/x.json".into(),
            message: "truncated".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Cache);
        assert!(!err.is_fatal_at_startup());
        assert!(!err.is_retryable());
    }

    #[test]
    fn retry_after_passthrough() {
        let err = WxError::RateLimited {
            provider: "openrouter".into(),
            retry_after: Some(Duration::from_secs(5)),
            message: "slow down".into(),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
    }
}
