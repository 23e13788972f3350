//! Test utilities for wxgen.
//!
//! Shared data factories for unit and integration tests: a fake
//! Open-Meteo ensemble payload, canned configs, and an isolated cache
//! store rooted in a temp directory.

use tempfile::TempDir;

use crate::config::{EntryOverrides, ForecastConfig, LocationConfig, SettingsBag};
use crate::sources::AlertSummary;
use crate::storage::CacheStore;

/// Settings resolved from an empty config: ECMWF ensemble, celsius,
/// 4 days, thin 16.
#[must_use]
pub fn make_default_settings() -> SettingsBag {
    SettingsBag::resolve(&ForecastConfig::default(), None, None).expect("default settings resolve")
}

/// A config with one location and the given forecast LLM.
#[must_use]
pub fn make_test_config(location: &str, llm: &str) -> ForecastConfig {
    ForecastConfig {
        locations: vec![LocationConfig {
            name: location.to_string(),
            overrides: EntryOverrides::default(),
        }],
        defaults: EntryOverrides {
            llm: Some(llm.to_string()),
            ..EntryOverrides::default()
        },
        ..ForecastConfig::default()
    }
}

/// An isolated cache store in a fresh temp dir. Keep the `TempDir`
/// alive for the duration of the test.
#[must_use]
pub fn make_test_store() -> (TempDir, CacheStore) {
    let tmp = TempDir::new().expect("temp dir");
    let store = CacheStore::new(tmp.path());
    (tmp, store)
}

/// A minimal but valid Open-Meteo ensemble payload: `hours` future
/// hourly steps, member00 plus `extra_members` suffixed members.
#[must_use]
pub fn make_test_forecast_payload(hours: usize, extra_members: usize) -> serde_json::Value {
    let mut hourly = serde_json::Map::new();
    let mut hourly_units = serde_json::Map::new();
    hourly_units.insert("temperature_2m".to_string(), "°C".into());

    let times: Vec<String> = (0..hours)
        .map(|h| format!("2099-06-01T{:02}:00", h % 24))
        .collect();
    hourly.insert("time".to_string(), serde_json::json!(times));

    let member_suffixes: Vec<String> = std::iter::once(String::new())
        .chain((1..=extra_members).map(|m| format!("_member{m:02}")))
        .collect();

    for suffix in &member_suffixes {
        if !suffix.is_empty() {
            hourly_units.insert(format!("temperature_2m{suffix}"), "°C".into());
        }
        let base = 14.0 + suffix.len() as f64;
        let series = |offset: f64| -> serde_json::Value {
            serde_json::json!(
                (0..hours)
                    .map(|h| base + offset + h as f64 * 0.1)
                    .collect::<Vec<f64>>()
            )
        };
        hourly.insert(format!("temperature_2m{suffix}"), series(0.0));
        hourly.insert(
            format!("precipitation{suffix}"),
            serde_json::json!(vec![0.0; hours]),
        );
        hourly.insert(
            format!("snowfall{suffix}"),
            serde_json::json!(vec![0.0; hours]),
        );
        hourly.insert(
            format!("weather_code{suffix}"),
            serde_json::json!(vec![2.0; hours]),
        );
        hourly.insert(
            format!("cloud_cover{suffix}"),
            serde_json::json!(vec![50.0; hours]),
        );
        hourly.insert(
            format!("wind_speed_10m{suffix}"),
            serde_json::json!(vec![15.0; hours]),
        );
        hourly.insert(
            format!("wind_direction_10m{suffix}"),
            serde_json::json!(vec![270.0; hours]),
        );
        hourly.insert(
            format!("wind_gusts_10m{suffix}"),
            serde_json::json!(vec![25.0; hours]),
        );
    }

    serde_json::json!({
        "latitude": -41.29,
        "longitude": 174.78,
        "hourly_units": hourly_units,
        "hourly": hourly,
    })
}

/// A canned alert for formatting tests.
#[must_use]
pub fn make_test_alert(title: &str) -> AlertSummary {
    AlertSummary {
        title: title.to_string(),
        description: "Damaging gusts possible in exposed places.".to_string(),
        severity: Some("Moderate".to_string()),
        source: Some("Test Weather Service".to_string()),
        onset: None,
        expires: None,
    }
}
