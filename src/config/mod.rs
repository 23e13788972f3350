//! Forecast configuration: file model, layered resolution, and hashing.

pub mod models;
pub mod resolve;

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, WxError};

pub use models::{DEFAULT_ENSEMBLE_MODEL, ENSEMBLE_MODELS, ModelKind, ModelSelector};
pub use resolve::{ReasoningLevel, ResolvedUnits, SettingsBag, UnitPair, Wordiness};

/// Unit preferences as written in the config file.
///
/// Each value is `"<primary>"` or `"<primary> (<secondary>)"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snowfall_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windspeed_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_m: Option<f64>,
}

impl UnitsConfig {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Optional per-entry overrides shared by locations, areas, and the
/// global layer. Resolution order: entry > area > global > default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryOverrides {
    /// Weather model selector (`ens:<id>`, `det:<id>`, or a bare id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Forecast LLM selector (`or:` prefix forces OpenRouter).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wordiness: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_based: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thin_select: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval_minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "UnitsConfig::is_empty")]
    pub units: UnitsConfig,
}

/// A single named forecast point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub name: String,
    #[serde(flatten)]
    pub overrides: EntryOverrides,
}

/// How an area's forecast text is organized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaMode {
    /// One combined narrative over the representative locations.
    #[default]
    Area,
    /// Narrative broken down by sub-region.
    Regional,
}

/// A named area covered by several representative locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaConfig {
    pub name: String,
    pub locations: Vec<String>,
    #[serde(default)]
    pub mode: AreaMode,
    #[serde(flatten)]
    pub overrides: EntryOverrides,
}

/// Top-level forecast configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default)]
    pub locations: Vec<LocationConfig>,
    #[serde(default)]
    pub areas: Vec<AreaConfig>,
    /// LLM used for impact-context lookups (Gemini/OpenAI only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_llm: Option<String>,
    /// LLM used for translation; falls back to the forecast LLM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_llm: Option<String>,
    #[serde(flatten)]
    pub defaults: EntryOverrides,
}

impl ForecastConfig {
    /// Load and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns a config error when the file is missing or unparseable.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WxError::ConfigNotFound {
                    path: path.display().to_string(),
                }
            } else {
                WxError::Io(e)
            }
        })?;
        serde_json::from_str(&content).map_err(|e| WxError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Deterministic digest of the whole config, used for cron-style
    /// "has anything changed" checks.
    #[must_use]
    pub fn hash(&self) -> String {
        canonical_hash(self)
    }

    /// Look up a configured location by (case-insensitive) name.
    #[must_use]
    pub fn find_location(&self, name: &str) -> Option<&LocationConfig> {
        let target = name.trim().to_lowercase();
        self.locations
            .iter()
            .find(|entry| entry.name.trim().to_lowercase() == target)
    }
}

/// SHA-256 of the canonical JSON form of any serializable value.
///
/// serde_json object keys serialize in sorted order, so two values that
/// resolve identically always hash identically regardless of how the
/// source file was formatted.
#[must_use]
pub fn canonical_hash<T: Serialize>(value: &T) -> String {
    let canonical = serde_json::to_value(value)
        .and_then(|v| serde_json::to_string(&v))
        .unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("config.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_minimal_config() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"{"locations": [{"name": "Wellington"}], "llm": "gpt-5-mini"}"#,
        );
        let config = ForecastConfig::load(&path).unwrap();
        assert_eq!(config.locations.len(), 1);
        assert_eq!(config.defaults.llm.as_deref(), Some("gpt-5-mini"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ForecastConfig::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, WxError::ConfigNotFound { .. }));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "{broken");
        let err = ForecastConfig::load(&path).unwrap_err();
        assert!(matches!(err, WxError::ConfigParse { .. }));
    }

    #[test]
    fn hash_ignores_formatting_but_not_content() {
        let tmp = TempDir::new().unwrap();
        let compact = write_config(&tmp, r#"{"locations":[{"name":"X"}],"llm":"gpt-5-mini"}"#);
        let spaced = tmp.path().join("spaced.json");
        std::fs::write(
            &spaced,
            "{\n  \"llm\": \"gpt-5-mini\",\n  \"locations\": [ {\"name\": \"X\"} ]\n}",
        )
        .unwrap();

        let a = ForecastConfig::load(&compact).unwrap().hash();
        let b = ForecastConfig::load(&spaced).unwrap().hash();
        assert_eq!(a, b);

        let changed = write_config(&tmp, r#"{"locations":[{"name":"Y"}],"llm":"gpt-5-mini"}"#);
        let c = ForecastConfig::load(&changed).unwrap().hash();
        assert_ne!(a, c);
    }

    #[test]
    fn area_mode_parses() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"{"areas": [{"name": "Coast", "locations": ["A", "B"], "mode": "regional"}]}"#,
        );
        let config = ForecastConfig::load(&path).unwrap();
        assert_eq!(config.areas[0].mode, AreaMode::Regional);
    }
}
