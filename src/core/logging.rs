//! Structured logging setup.
//!
//! Logs go to stderr by default (or a file via `WXGEN_LOG_FILE`) so the
//! run summary on stdout stays machine-readable.

use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const LOG_LEVEL_ENV: &str = "WXGEN_LOG";
const LOG_FORMAT_ENV: &str = "WXGEN_LOG_FORMAT";
const LOG_FILE_ENV: &str = "WXGEN_LOG_FILE";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable logs.
    #[default]
    Human,
    /// JSON logs (one event per line).
    Json,
    /// Compact logs (single line, terse).
    Compact,
}

impl LogFormat {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Log level from CLI argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse from CLI argument.
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "verbose" | "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "critical" => Some(Self::Error),
            _ => None,
        }
    }

    /// Convert to tracing filter string.
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Parse log level from the WXGEN_LOG env var.
#[must_use]
pub fn parse_log_level_from_env() -> Option<LogLevel> {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| LogLevel::from_arg(value.trim()))
}

/// Parse log format from the WXGEN_LOG_FORMAT env var.
#[must_use]
pub fn parse_log_format_from_env() -> Option<LogFormat> {
    std::env::var(LOG_FORMAT_ENV)
        .ok()
        .and_then(|value| LogFormat::from_arg(value.trim()))
}

/// Parse log file path from the WXGEN_LOG_FILE env var.
#[must_use]
pub fn parse_log_file_from_env() -> Option<PathBuf> {
    std::env::var(LOG_FILE_ENV).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    })
}

/// Initialize logging with the given settings.
pub fn init(level: LogLevel, format: LogFormat, log_file: Option<PathBuf>) {
    let file = log_file.and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok()
    });

    let make_writer = |file: Option<&std::fs::File>| -> BoxMakeWriter {
        if let Some(file) = file.and_then(|inner| inner.try_clone().ok()) {
            BoxMakeWriter::new(file)
        } else {
            BoxMakeWriter::new(std::io::stderr)
        }
    };

    let make_filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("wxgen={}", level.as_filter())))
    };

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(make_filter())
                .json()
                .with_writer(make_writer(file.as_ref()))
                .with_span_events(FmtSpan::CLOSE)
                .try_init()
                .ok();
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .with_env_filter(make_filter())
                .compact()
                .with_writer(make_writer(file.as_ref()))
                .with_target(true)
                .try_init()
                .ok();
        }
        LogFormat::Human => {
            tracing_subscriber::fmt()
                .with_env_filter(make_filter())
                .with_writer(make_writer(file.as_ref()))
                .with_target(false)
                .without_time()
                .try_init()
                .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing() {
        assert_eq!(LogLevel::from_arg("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_arg("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_arg("nope"), None);
    }

    #[test]
    fn format_parsing() {
        assert_eq!(LogFormat::from_arg("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::from_arg("HUMAN"), Some(LogFormat::Human));
        assert_eq!(LogFormat::from_arg("xml"), None);
    }
}
