//! Layered settings resolution.
//!
//! `SettingsBag::resolve` is a pure merge over the global, area, and
//! entry layers — no I/O — so precedence is testable in isolation.
//! Resolution order per field: entry > area (for locations reached
//! through that area) > global > built-in default.

use serde::{Deserialize, Serialize};

use super::models::ModelSelector;
use super::{AreaConfig, EntryOverrides, ForecastConfig, LocationConfig, UnitsConfig};
use crate::error::{Result, WxError};

/// How verbose the generated forecast text should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wordiness {
    Brief,
    #[default]
    Normal,
    Detailed,
}

impl Wordiness {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "brief" | "short" => Ok(Self::Brief),
            "normal" => Ok(Self::Normal),
            "detailed" | "long" => Ok(Self::Detailed),
            other => Err(WxError::ConfigInvalid {
                field: "wordiness".into(),
                message: format!("unknown wordiness '{other}'"),
            }),
        }
    }

    /// Token used inside prompts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brief => "brief",
            Self::Normal => "normal",
            Self::Detailed => "detailed",
        }
    }
}

/// Requested reasoning depth for providers that support it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningLevel {
    Off,
    Minimal,
    Low,
    Medium,
    High,
    #[default]
    Auto,
}

impl ReasoningLevel {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "off" | "none" | "disable" | "disabled" | "false" => Ok(Self::Off),
            "minimal" => Ok(Self::Minimal),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "auto" => Ok(Self::Auto),
            other => Err(WxError::ConfigInvalid {
                field: "reasoning".into(),
                message: format!("unknown reasoning level '{other}'"),
            }),
        }
    }
}

/// A display unit with an optional secondary unit shown in parentheses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPair {
    pub primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
}

impl UnitPair {
    fn single(primary: &str) -> Self {
        Self {
            primary: primary.to_string(),
            secondary: None,
        }
    }
}

/// Fully resolved unit preferences for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedUnits {
    pub temperature: UnitPair,
    pub precipitation: UnitPair,
    pub snowfall: UnitPair,
    pub windspeed: UnitPair,
    pub altitude_m: f64,
}

/// Canonical per-target settings, immutable once resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsBag {
    pub model: ModelSelector,
    pub units: ResolvedUnits,
    pub forecast_days: u32,
    pub wordiness: Wordiness,
    pub reasoning: ReasoningLevel,
    pub impact_context: bool,
    /// Ensemble members carried forward; clamped to the model's count.
    pub thin_select: usize,
    /// Forecast LLM selector string, if configured.
    pub llm_model: Option<String>,
    /// Impact-context LLM selector string, if configured.
    pub impact_model: Option<String>,
    /// Target translation language; `None` or English skips translation.
    pub translation_language: Option<String>,
    /// Translation LLM selector; falls back to the forecast LLM.
    pub translation_model: Option<String>,
    /// Existing output younger than this is skipped unless forced.
    pub refresh_interval_minutes: u64,
}

impl SettingsBag {
    /// Merge the configuration layers for a location entry.
    ///
    /// `parent` is the area through which the location is being
    /// resolved, when any; `entry` is the location's own config entry,
    /// when the location is explicitly configured.
    ///
    /// # Errors
    ///
    /// Unknown units, wordiness, reasoning, or ensemble model ids fail
    /// with a config error naming the offending field.
    pub fn resolve(
        global: &ForecastConfig,
        parent: Option<&AreaConfig>,
        entry: Option<&LocationConfig>,
    ) -> Result<Self> {
        let layers = Layers {
            entry: entry.map(|e| &e.overrides),
            parent: parent.map(|a| &a.overrides),
            global: &global.defaults,
        };

        let model = ModelSelector::resolve(layers.pick(|o| o.model.clone()).as_deref())?;
        let units = resolve_units(&layers)?;

        let wordiness = match layers.pick(|o| o.wordiness.clone()) {
            Some(raw) => Wordiness::parse(&raw)?,
            None => Wordiness::default(),
        };
        let reasoning = match layers.pick(|o| o.reasoning.clone()) {
            Some(raw) => ReasoningLevel::parse(&raw)?,
            None => ReasoningLevel::default(),
        };

        let thin_select = layers
            .pick(|o| o.thin_select)
            .unwrap_or(16)
            .clamp(1, model.members.max(1));

        let translation_language = layers
            .pick(|o| o.translation_language.clone())
            .filter(|lang| !lang.trim().is_empty());

        Ok(Self {
            model,
            units,
            forecast_days: layers.pick(|o| o.forecast_days).unwrap_or(4),
            wordiness,
            reasoning,
            impact_context: layers.pick(|o| o.impact_based).unwrap_or(false),
            thin_select,
            llm_model: layers.pick(|o| o.llm.clone()),
            impact_model: global.impact_llm.clone(),
            translation_language,
            translation_model: global.translation_llm.clone(),
            refresh_interval_minutes: layers.pick(|o| o.refresh_interval_minutes).unwrap_or(0),
        })
    }

    /// Merge the configuration layers for an area target itself.
    pub fn resolve_area(global: &ForecastConfig, area: &AreaConfig) -> Result<Self> {
        // The area's own overrides sit in the entry position.
        let as_entry = LocationConfig {
            name: area.name.clone(),
            overrides: area.overrides.clone(),
        };
        Self::resolve(global, None, Some(&as_entry))
    }

    /// True when the resolved translation target is a non-English language.
    #[must_use]
    pub fn wants_translation(&self) -> bool {
        self.translation_language
            .as_deref()
            .is_some_and(|lang| !lang.trim().to_lowercase().starts_with("en"))
    }
}

/// Precedence-ordered view over the three override layers.
struct Layers<'a> {
    entry: Option<&'a EntryOverrides>,
    parent: Option<&'a EntryOverrides>,
    global: &'a EntryOverrides,
}

impl Layers<'_> {
    fn pick<T>(&self, get: impl Fn(&EntryOverrides) -> Option<T>) -> Option<T> {
        self.entry
            .and_then(&get)
            .or_else(|| self.parent.and_then(&get))
            .or_else(|| get(self.global))
    }

    fn pick_unit(&self, get: impl Fn(&UnitsConfig) -> Option<String>) -> Option<String> {
        self.pick(|o| get(&o.units))
    }

    fn pick_unit_altitude(&self) -> f64 {
        self.pick(|o| o.units.altitude_m).unwrap_or(0.0)
    }
}

fn resolve_units(layers: &Layers<'_>) -> Result<ResolvedUnits> {
    let temperature = parse_unit_pair(
        "temperature_unit",
        layers.pick_unit(|u| u.temperature_unit.clone()),
        &normalize_temperature,
    )?
    .unwrap_or_else(|| UnitPair::single("celsius"));

    let precipitation = parse_unit_pair(
        "precipitation_unit",
        layers.pick_unit(|u| u.precipitation_unit.clone()),
        &normalize_precipitation,
    )?
    .unwrap_or_else(|| UnitPair::single("mm"));

    let explicit_snowfall = parse_unit_pair(
        "snowfall_unit",
        layers.pick_unit(|u| u.snowfall_unit.clone()),
        &normalize_snowfall,
    )?;
    // Imperial precipitation implies imperial snowfall unless overridden.
    let snowfall = explicit_snowfall.unwrap_or_else(|| {
        if precipitation.primary == "inch" {
            UnitPair::single("inch")
        } else {
            UnitPair::single("cm")
        }
    });

    let windspeed = parse_unit_pair(
        "windspeed_unit",
        layers.pick_unit(|u| u.windspeed_unit.clone()),
        &normalize_windspeed,
    )?
    .unwrap_or_else(|| UnitPair::single("kph"));

    Ok(ResolvedUnits {
        temperature,
        precipitation,
        snowfall,
        windspeed,
        altitude_m: layers.pick_unit_altitude(),
    })
}

/// Split `"x"` / `"x (y)"` and normalize both tokens.
fn parse_unit_pair(
    field: &str,
    raw: Option<String>,
    normalize: &dyn Fn(&str) -> Option<&'static str>,
) -> Result<Option<UnitPair>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let (primary_raw, secondary_raw) = match raw.split_once('(') {
        Some((primary, rest)) if rest.ends_with(')') => {
            (primary.trim(), Some(rest[..rest.len() - 1].trim()))
        }
        _ => (raw, None),
    };

    let primary = normalize(primary_raw).ok_or_else(|| WxError::UnknownUnit {
        field: field.to_string(),
        token: primary_raw.to_string(),
    })?;
    let secondary = match secondary_raw.filter(|s| !s.is_empty()) {
        Some(token) => Some(
            normalize(token)
                .ok_or_else(|| WxError::UnknownUnit {
                    field: field.to_string(),
                    token: token.to_string(),
                })?
                .to_string(),
        ),
        None => None,
    };

    Ok(Some(UnitPair {
        primary: primary.to_string(),
        secondary,
    }))
}

fn normalize_temperature(token: &str) -> Option<&'static str> {
    match token.to_lowercase().as_str() {
        "celsius" | "c" => Some("celsius"),
        "fahrenheit" | "f" => Some("fahrenheit"),
        _ => None,
    }
}

fn normalize_precipitation(token: &str) -> Option<&'static str> {
    match token.to_lowercase().as_str() {
        "mm" => Some("mm"),
        "inch" | "in" | "inches" => Some("inch"),
        _ => None,
    }
}

fn normalize_snowfall(token: &str) -> Option<&'static str> {
    match token.to_lowercase().as_str() {
        "cm" => Some("cm"),
        "inch" | "in" | "inches" => Some("inch"),
        _ => None,
    }
}

fn normalize_windspeed(token: &str) -> Option<&'static str> {
    match token.to_lowercase().as_str() {
        "kph" | "kmh" | "km/h" => Some("kph"),
        "mph" => Some("mph"),
        "mps" | "ms" | "m/s" => Some("mps"),
        "kt" | "kn" | "kts" | "knots" => Some("kt"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AreaMode;

    fn global_with(defaults: EntryOverrides) -> ForecastConfig {
        ForecastConfig {
            defaults,
            ..ForecastConfig::default()
        }
    }

    fn location(name: &str, overrides: EntryOverrides) -> LocationConfig {
        LocationConfig {
            name: name.to_string(),
            overrides,
        }
    }

    #[test]
    fn defaults_apply_when_nothing_configured() {
        let global = ForecastConfig::default();
        let bag = SettingsBag::resolve(&global, None, None).unwrap();

        assert_eq!(bag.model.model_id, "ecmwf_ifs025");
        assert_eq!(bag.units.temperature.primary, "celsius");
        assert_eq!(bag.units.windspeed.primary, "kph");
        assert_eq!(bag.forecast_days, 4);
        assert_eq!(bag.thin_select, 16);
        assert_eq!(bag.wordiness, Wordiness::Normal);
        assert!(!bag.impact_context);
    }

    #[test]
    fn entry_overrides_beat_global() {
        let global = global_with(EntryOverrides {
            units: UnitsConfig {
                temperature_unit: Some("celsius".into()),
                ..UnitsConfig::default()
            },
            ..EntryOverrides::default()
        });
        let entry = location(
            "Miami",
            EntryOverrides {
                units: UnitsConfig {
                    temperature_unit: Some("fahrenheit".into()),
                    ..UnitsConfig::default()
                },
                ..EntryOverrides::default()
            },
        );

        let with_override = SettingsBag::resolve(&global, None, Some(&entry)).unwrap();
        assert_eq!(with_override.units.temperature.primary, "fahrenheit");

        let sibling = SettingsBag::resolve(&global, None, None).unwrap();
        assert_eq!(sibling.units.temperature.primary, "celsius");
    }

    #[test]
    fn area_layer_sits_between_entry_and_global() {
        let global = global_with(EntryOverrides {
            forecast_days: Some(4),
            ..EntryOverrides::default()
        });
        let area = AreaConfig {
            name: "Coast".into(),
            locations: vec!["Nelson".into()],
            mode: AreaMode::Area,
            overrides: EntryOverrides {
                forecast_days: Some(3),
                ..EntryOverrides::default()
            },
        };
        let entry = location(
            "Nelson",
            EntryOverrides {
                forecast_days: Some(2),
                ..EntryOverrides::default()
            },
        );

        let via_area = SettingsBag::resolve(&global, Some(&area), None).unwrap();
        assert_eq!(via_area.forecast_days, 3);

        let entry_wins = SettingsBag::resolve(&global, Some(&area), Some(&entry)).unwrap();
        assert_eq!(entry_wins.forecast_days, 2);
    }

    #[test]
    fn secondary_units_parse() {
        let entry = location(
            "Denver",
            EntryOverrides {
                units: UnitsConfig {
                    temperature_unit: Some("fahrenheit (celsius)".into()),
                    windspeed_unit: Some("mph (kph)".into()),
                    ..UnitsConfig::default()
                },
                ..EntryOverrides::default()
            },
        );
        let bag = SettingsBag::resolve(&ForecastConfig::default(), None, Some(&entry)).unwrap();
        assert_eq!(bag.units.temperature.primary, "fahrenheit");
        assert_eq!(bag.units.temperature.secondary.as_deref(), Some("celsius"));
        assert_eq!(bag.units.windspeed.secondary.as_deref(), Some("kph"));
    }

    #[test]
    fn unknown_unit_names_the_field() {
        let entry = location(
            "X",
            EntryOverrides {
                units: UnitsConfig {
                    windspeed_unit: Some("furlongs".into()),
                    ..UnitsConfig::default()
                },
                ..EntryOverrides::default()
            },
        );
        let err = SettingsBag::resolve(&ForecastConfig::default(), None, Some(&entry)).unwrap_err();
        match err {
            WxError::UnknownUnit { field, token } => {
                assert_eq!(field, "windspeed_unit");
                assert_eq!(token, "furlongs");
            }
            other => panic!("expected UnknownUnit, got {other}"),
        }
    }

    #[test]
    fn inch_precipitation_implies_inch_snowfall() {
        let entry = location(
            "Boston",
            EntryOverrides {
                units: UnitsConfig {
                    precipitation_unit: Some("inch".into()),
                    ..UnitsConfig::default()
                },
                ..EntryOverrides::default()
            },
        );
        let bag = SettingsBag::resolve(&ForecastConfig::default(), None, Some(&entry)).unwrap();
        assert_eq!(bag.units.snowfall.primary, "inch");
    }

    #[test]
    fn thin_select_clamps_to_member_count() {
        let entry = location(
            "X",
            EntryOverrides {
                model: Some("ukmo_uk_ensemble_2km".into()),
                thin_select: Some(16),
                ..EntryOverrides::default()
            },
        );
        let bag = SettingsBag::resolve(&ForecastConfig::default(), None, Some(&entry)).unwrap();
        assert_eq!(bag.model.members, 3);
        assert_eq!(bag.thin_select, 3);

        let zero = location(
            "X",
            EntryOverrides {
                thin_select: Some(0),
                ..EntryOverrides::default()
            },
        );
        let bag = SettingsBag::resolve(&ForecastConfig::default(), None, Some(&zero)).unwrap();
        assert_eq!(bag.thin_select, 1);
    }

    #[test]
    fn unknown_ensemble_model_is_rejected() {
        let entry = location(
            "X",
            EntryOverrides {
                model: Some("ens:no_such_model".into()),
                ..EntryOverrides::default()
            },
        );
        let err = SettingsBag::resolve(&ForecastConfig::default(), None, Some(&entry)).unwrap_err();
        assert!(matches!(err, WxError::UnknownEnsembleModel(_)));
    }

    #[test]
    fn translation_wanted_only_for_non_english() {
        let mut entry = location(
            "X",
            EntryOverrides {
                translation_language: Some("French".into()),
                ..EntryOverrides::default()
            },
        );
        let bag = SettingsBag::resolve(&ForecastConfig::default(), None, Some(&entry)).unwrap();
        assert!(bag.wants_translation());

        entry.overrides.translation_language = Some("English".into());
        let bag = SettingsBag::resolve(&ForecastConfig::default(), None, Some(&entry)).unwrap();
        assert!(!bag.wants_translation());
    }

    #[test]
    fn resolved_bags_hash_deterministically() {
        let global = ForecastConfig::default();
        let a = SettingsBag::resolve(&global, None, None).unwrap();
        let b = SettingsBag::resolve(&global, None, None).unwrap();
        assert_eq!(
            crate::config::canonical_hash(&a),
            crate::config::canonical_hash(&b)
        );
    }
}
