//! Active weather alerts, routed by country.
//!
//! The US route talks to the National Weather Service; everywhere else
//! goes through OpenWeatherMap's One Call API when a key is configured.
//! The country code itself comes from a cached reverse-geocode lookup.
//! Alert lookups degrade to an empty list — a missing warning feed never
//! takes a forecast down with it.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{CacheStore, Namespace};

const NWS_SOURCE: &str = "nws-alerts";
const OWM_SOURCE: &str = "openweathermap";

/// A normalized weather alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertSummary {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NwsResponse {
    #[serde(default)]
    features: Vec<NwsFeature>,
}

#[derive(Debug, Deserialize)]
struct NwsFeature {
    #[serde(default)]
    properties: NwsProperties,
}

#[derive(Debug, Default, Deserialize)]
struct NwsProperties {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    onset: Option<String>,
    #[serde(default)]
    ends: Option<String>,
    #[serde(default)]
    expires: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    #[serde(default)]
    alerts: Vec<OwmAlert>,
}

#[derive(Debug, Deserialize)]
struct OwmAlert {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    sender_name: Option<String>,
    #[serde(default)]
    start: Option<i64>,
    #[serde(default)]
    end: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwmReverseEntry {
    #[serde(default)]
    country: Option<String>,
}

/// Alert client bound to a cache store.
#[derive(Debug, Clone)]
pub struct AlertSource {
    http: reqwest::Client,
    store: CacheStore,
    openweathermap_api_key: Option<String>,
    nws_url: String,
    owm_onecall_url: String,
    owm_reverse_url: String,
}

impl AlertSource {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        store: CacheStore,
        openweathermap_api_key: Option<String>,
    ) -> Self {
        Self {
            http,
            store,
            openweathermap_api_key,
            nws_url: "https://api.weather.gov/alerts/active".to_string(),
            owm_onecall_url: "https://api.openweathermap.org/data/3.0/onecall".to_string(),
            owm_reverse_url: "https://api.openweathermap.org/geo/1.0/reverse".to_string(),
        }
    }

    /// Point all endpoints at a fake server (tests).
    #[must_use]
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.nws_url = format!("{url}/alerts/active");
        self.owm_onecall_url = format!("{url}/data/3.0/onecall");
        self.owm_reverse_url = format!("{url}/geo/1.0/reverse");
        self
    }

    /// Fetch active alerts for a coordinate.
    ///
    /// Provider errors are logged and degrade to an empty list.
    pub async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        country_code: Option<&str>,
    ) -> Vec<AlertSummary> {
        let country = match country_code {
            Some(code) => Some(code.to_uppercase()),
            None => self.resolve_country(latitude, longitude).await,
        };

        let result = match country.as_deref() {
            Some("US") => self.fetch_us(latitude, longitude).await,
            _ => self.fetch_openweather(latitude, longitude).await,
        };

        match result {
            Ok(alerts) => alerts,
            Err(e) => {
                tracing::warn!(lat = latitude, lon = longitude, error = %e, "Alert fetch failed; continuing without alerts");
                Vec::new()
            }
        }
    }

    async fn fetch_us(&self, latitude: f64, longitude: f64) -> Result<Vec<AlertSummary>> {
        let point = format!("{latitude},{longitude}");
        let query = [("point", point.as_str())];
        let response: NwsResponse =
            crate::core::http::fetch_json(&self.http, NWS_SOURCE, &self.nws_url, &query).await?;

        Ok(response
            .features
            .into_iter()
            .map(|feature| {
                let props = feature.properties;
                AlertSummary {
                    title: props.event.unwrap_or_else(|| "NWS Alert".to_string()),
                    description: props
                        .description
                        .or(props.headline)
                        .unwrap_or_default(),
                    severity: props.severity,
                    source: Some("National Weather Service".to_string()),
                    onset: props.onset,
                    expires: props.ends.or(props.expires),
                }
            })
            .collect())
    }

    async fn fetch_openweather(&self, latitude: f64, longitude: f64) -> Result<Vec<AlertSummary>> {
        let Some(api_key) = self.openweathermap_api_key.as_deref() else {
            tracing::debug!("OPENWEATHERMAP_API_KEY not configured; skipping alerts");
            return Ok(Vec::new());
        };

        let lat = latitude.to_string();
        let lon = longitude.to_string();
        let query = [
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("exclude", "current,minutely,hourly,daily"),
            ("appid", api_key),
        ];
        let response: OwmResponse =
            crate::core::http::fetch_json(&self.http, OWM_SOURCE, &self.owm_onecall_url, &query)
                .await?;

        Ok(response
            .alerts
            .into_iter()
            .map(|alert| AlertSummary {
                title: alert.event.unwrap_or_else(|| "Weather Alert".to_string()),
                description: alert.description.unwrap_or_default(),
                severity: None,
                source: alert.sender_name,
                onset: alert.start.map(unix_to_iso),
                expires: alert.end.map(unix_to_iso),
            })
            .collect())
    }

    /// Reverse geocode the coordinate to an ISO country code, cached in
    /// the country namespace.
    async fn resolve_country(&self, latitude: f64, longitude: f64) -> Option<String> {
        let key = format!("{latitude:.4}_{longitude:.4}");
        if let Some(entry) = self.store.get::<String>(Namespace::Country, &key) {
            return Some(entry.payload);
        }

        let code = self.reverse_country_openweather(latitude, longitude).await?;
        let params = serde_json::json!({ "latitude": latitude, "longitude": longitude });
        if let Err(e) = self
            .store
            .put_with_params(Namespace::Country, &key, &code, params, None)
        {
            tracing::debug!(error = %e, "Failed to write country cache");
        }
        Some(code)
    }

    async fn reverse_country_openweather(&self, latitude: f64, longitude: f64) -> Option<String> {
        let api_key = self.openweathermap_api_key.as_deref()?;
        let lat = latitude.to_string();
        let lon = longitude.to_string();
        let query = [
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("limit", "1"),
            ("appid", api_key),
        ];
        let response: Vec<OwmReverseEntry> =
            crate::core::http::fetch_json(&self.http, OWM_SOURCE, &self.owm_reverse_url, &query)
                .await
                .map_err(|e| {
                    tracing::debug!(error = %e, "Reverse country lookup failed");
                })
                .ok()?;
        response.into_iter().next().and_then(|entry| entry.country)
    }
}

fn unix_to_iso(value: i64) -> String {
    chrono::DateTime::from_timestamp(value, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_timestamps_convert() {
        assert!(unix_to_iso(1_700_000_000).starts_with("2023-11-14T"));
        assert_eq!(unix_to_iso(i64::MAX), "");
    }
}
