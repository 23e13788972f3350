//! Open-Meteo forecast client with cache-backed fetching.
//!
//! Ensemble models route to the ensemble endpoint, deterministic models
//! to the standard forecast endpoint. Responses are cached per request
//! key; a fresh cache entry short-circuits the network entirely, and an
//! expired entry still serves as the degraded fallback when every retry
//! fails.

use std::time::Duration;

use serde_json::json;

use crate::config::{ModelKind, SettingsBag};
use crate::error::{Result, WxError};
use crate::storage::{CacheStore, Namespace};

const SOURCE_NAME: &str = "open-meteo";

/// Hourly fields requested from the API.
const HOURLY_FIELDS: &str = "temperature_2m,dewpoint_2m,precipitation,snowfall,weather_code,cloud_cover,wind_speed_10m,wind_direction_10m,wind_gusts_10m";

const FETCH_ATTEMPTS: u32 = 3;

/// Parameters for one forecast request.
#[derive(Debug, Clone)]
pub struct ForecastRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub forecast_days: u32,
    pub temperature_unit: String,
    pub precipitation_unit: String,
    pub windspeed_unit: String,
    pub model_id: String,
    pub model_kind: ModelKind,
}

impl ForecastRequest {
    /// Build a request from resolved settings and a geocoded point.
    #[must_use]
    pub fn from_settings(
        settings: &SettingsBag,
        latitude: f64,
        longitude: f64,
        timezone: &str,
    ) -> Self {
        Self {
            latitude,
            longitude,
            timezone: timezone.to_string(),
            forecast_days: settings.forecast_days,
            temperature_unit: settings.units.temperature.primary.clone(),
            precipitation_unit: settings.units.precipitation.primary.clone(),
            windspeed_unit: settings.units.windspeed.primary.clone(),
            model_id: settings.model.model_id.clone(),
            model_kind: settings.model.kind,
        }
    }

    /// Stable cache key: identical request parameters always produce the
    /// same key.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let lat_suffix = if self.latitude >= 0.0 { "N" } else { "S" };
        let lon_suffix = if self.longitude >= 0.0 { "E" } else { "W" };
        let kind_token = match self.model_kind {
            ModelKind::Ensemble => "ens",
            ModelKind::Deterministic => "det",
        };
        format!(
            "{:.2}{}_{:.2}{}_{}_{}_{}_{}_{}_{}",
            self.latitude.abs(),
            lat_suffix,
            self.longitude.abs(),
            lon_suffix,
            self.forecast_days,
            self.temperature_unit,
            self.precipitation_unit,
            self.windspeed_unit,
            kind_token,
            self.model_id.to_lowercase(),
        )
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("timezone", self.timezone.clone()),
            ("forecast_days", self.forecast_days.to_string()),
            ("temperature_unit", self.temperature_unit.clone()),
            ("windspeed_unit", api_windspeed_unit(&self.windspeed_unit)),
            ("precipitation_unit", self.precipitation_unit.clone()),
            ("models", self.model_id.clone()),
        ]
    }
}

/// Raw forecast payload plus provenance.
#[derive(Debug, Clone)]
pub struct ForecastPayload {
    pub raw: serde_json::Value,
    pub from_cache: bool,
    /// Set when the payload came from an expired entry after retries
    /// exhausted.
    pub stale: bool,
}

/// Open-Meteo client bound to a cache store.
#[derive(Debug, Clone)]
pub struct WeatherSource {
    http: reqwest::Client,
    store: CacheStore,
    ensemble_url: String,
    forecast_url: String,
}

impl WeatherSource {
    #[must_use]
    pub fn new(http: reqwest::Client, store: CacheStore) -> Self {
        Self {
            http,
            store,
            ensemble_url: "https://ensemble-api.open-meteo.com/v1/ensemble".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
        }
    }

    /// Point both endpoints at a fake server (tests).
    #[must_use]
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.ensemble_url = format!("{url}/v1/ensemble");
        self.forecast_url = format!("{url}/v1/forecast");
        self
    }

    /// Fetch forecast data, consulting the cache first.
    ///
    /// # Errors
    ///
    /// Fetch errors after bounded retries, when no cache entry (fresh or
    /// stale) can stand in.
    pub async fn fetch(&self, request: &ForecastRequest) -> Result<ForecastPayload> {
        self.store.sweep(Namespace::Forecast);

        let key = request.cache_key();
        if let Some(entry) = self
            .store
            .get::<serde_json::Value>(Namespace::Forecast, &key)
        {
            tracing::debug!(key = %key, "Forecast cache hit");
            return Ok(ForecastPayload {
                raw: entry.payload,
                from_cache: true,
                stale: false,
            });
        }

        match self.download(request).await {
            Ok(raw) => {
                let params = json!({
                    "latitude": request.latitude,
                    "longitude": request.longitude,
                    "forecast_days": request.forecast_days,
                    "model": request.model_id,
                });
                if let Err(e) = self
                    .store
                    .put_with_params(Namespace::Forecast, &key, &raw, params, None)
                {
                    tracing::warn!(key = %key, error = %e, "Failed to write forecast cache");
                }
                Ok(ForecastPayload {
                    raw,
                    from_cache: false,
                    stale: false,
                })
            }
            Err(fetch_error) => {
                // Degrade to the last good entry if one survives, however old.
                if let Some(entry) = self
                    .store
                    .get_ignoring_freshness::<serde_json::Value>(Namespace::Forecast, &key)
                {
                    tracing::warn!(
                        key = %key,
                        error = %fetch_error,
                        age_secs = entry.age().as_secs(),
                        "Serving stale forecast cache after fetch failure"
                    );
                    return Ok(ForecastPayload {
                        raw: entry.payload,
                        from_cache: true,
                        stale: true,
                    });
                }
                Err(fetch_error)
            }
        }
    }

    async fn download(&self, request: &ForecastRequest) -> Result<serde_json::Value> {
        let url = match request.model_kind {
            ModelKind::Ensemble => &self.ensemble_url,
            ModelKind::Deterministic => &self.forecast_url,
        };
        let query = request.query();

        let mut last_error: Option<WxError> = None;
        for attempt in 1..=FETCH_ATTEMPTS {
            match crate::core::http::fetch_json::<serde_json::Value, _>(
                &self.http,
                SOURCE_NAME,
                url,
                &query,
            )
            .await
            .and_then(|data| {
                validate_response(&data)?;
                Ok(data)
            }) {
                Ok(data) => {
                    tracing::info!(
                        model = %request.model_id,
                        lat = request.latitude,
                        lon = request.longitude,
                        "Fetched forecast"
                    );
                    return Ok(data);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = FETCH_ATTEMPTS,
                        error = %e,
                        "Forecast fetch failed"
                    );
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
            if attempt < FETCH_ATTEMPTS {
                tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
            }
        }

        Err(last_error.unwrap_or_else(|| WxError::FetchNetwork {
            source_name: SOURCE_NAME.to_string(),
            message: "fetch failed with no recorded error".to_string(),
        }))
    }
}

/// Ensure the payload carries the expected hourly structure.
fn validate_response(data: &serde_json::Value) -> Result<()> {
    let has_time = data
        .get("hourly")
        .and_then(|hourly| hourly.get("time"))
        .is_some_and(serde_json::Value::is_array);
    if has_time {
        Ok(())
    } else {
        Err(WxError::FetchMalformed {
            source_name: SOURCE_NAME.to_string(),
            message: "response missing 'hourly.time'".to_string(),
        })
    }
}

/// Map internal wind unit tokens to the API's expected values.
fn api_windspeed_unit(unit: &str) -> String {
    match unit {
        "kph" => "kmh",
        "kt" => "kn",
        "mps" => "ms",
        other => other,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastConfig;

    fn request() -> ForecastRequest {
        let settings = SettingsBag::resolve(&ForecastConfig::default(), None, None).unwrap();
        ForecastRequest::from_settings(&settings, -41.2889, 174.7772, "Pacific/Auckland")
    }

    #[test]
    fn cache_key_is_deterministic_and_param_sensitive() {
        let a = request();
        let b = request();
        assert_eq!(a.cache_key(), b.cache_key());

        let mut c = request();
        c.forecast_days = 7;
        assert_ne!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn cache_key_encodes_hemispheres() {
        let key = request().cache_key();
        assert!(key.starts_with("41.29S_174.78E_"));
        assert!(key.contains("_ens_"));
    }

    #[test]
    fn windspeed_units_map_to_api_tokens() {
        assert_eq!(api_windspeed_unit("kph"), "kmh");
        assert_eq!(api_windspeed_unit("kt"), "kn");
        assert_eq!(api_windspeed_unit("mps"), "ms");
        assert_eq!(api_windspeed_unit("mph"), "mph");
    }

    #[test]
    fn validation_requires_hourly_time() {
        assert!(validate_response(&serde_json::json!({"hourly": {"time": []}})).is_ok());
        assert!(validate_response(&serde_json::json!({"hourly": {}})).is_err());
        assert!(validate_response(&serde_json::json!({})).is_err());
    }
}
