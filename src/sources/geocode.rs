//! Name-to-coordinate geocoding with a primary and secondary provider.
//!
//! Open-Meteo's geocoding API is tried first; the Google Geocoding API
//! stands in when the primary fails or returns nothing, and is only
//! consulted when a key is configured. Results are cached indefinitely —
//! places do not move.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WxError};
use crate::storage::{CacheStore, Namespace};
use crate::util::slugify;

const PRIMARY_SOURCE: &str = "open-meteo-geocoding";
const SECONDARY_SOURCE: &str = "google-geocoding";

/// Resolved location data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeocodeResult {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoSearchResponse {
    #[serde(default)]
    results: Vec<OpenMeteoSearchEntry>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoSearchEntry {
    name: Option<String>,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    elevation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GoogleGeocodeResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<GoogleGeocodeEntry>,
}

#[derive(Debug, Deserialize)]
struct GoogleGeocodeEntry {
    #[serde(default)]
    formatted_address: Option<String>,
    geometry: GoogleGeometry,
    #[serde(default)]
    address_components: Vec<GoogleAddressComponent>,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLatLng,
}

#[derive(Debug, Deserialize)]
struct GoogleLatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct GoogleAddressComponent {
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleTimezoneResponse {
    #[serde(default)]
    status: String,
    #[serde(default, rename = "timeZoneId")]
    time_zone_id: Option<String>,
}

/// Geocoding client bound to a cache store.
#[derive(Debug, Clone)]
pub struct GeocodeSource {
    http: reqwest::Client,
    store: CacheStore,
    google_api_key: Option<String>,
    primary_url: String,
    secondary_url: String,
    timezone_url: String,
}

impl GeocodeSource {
    #[must_use]
    pub fn new(http: reqwest::Client, store: CacheStore, google_api_key: Option<String>) -> Self {
        Self {
            http,
            store,
            google_api_key,
            primary_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            secondary_url: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            timezone_url: "https://maps.googleapis.com/maps/api/timezone/json".to_string(),
        }
    }

    /// Point all endpoints at a fake server (tests).
    #[must_use]
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.primary_url = format!("{url}/v1/search");
        self.secondary_url = format!("{url}/maps/api/geocode/json");
        self.timezone_url = format!("{url}/maps/api/timezone/json");
        self
    }

    /// Resolve a place name, consulting the cache first.
    ///
    /// # Errors
    ///
    /// `GeocodeNotFound` when neither provider can resolve the name.
    pub async fn resolve(&self, name: &str) -> Result<GeocodeResult> {
        let key = slugify(name);
        if let Some(entry) = self.store.get::<GeocodeResult>(Namespace::Geocode, &key) {
            tracing::debug!(name, "Geocode cache hit");
            return Ok(entry.payload);
        }

        let result = match self.resolve_primary(name).await {
            Ok(Some(result)) => Some(result),
            Ok(None) => {
                tracing::info!(name, "No primary geocoding results");
                None
            }
            Err(e) => {
                tracing::warn!(name, error = %e, "Primary geocoding failed");
                None
            }
        };

        let result = match result {
            Some(result) => result,
            None => self
                .resolve_secondary(name)
                .await?
                .ok_or_else(|| WxError::GeocodeNotFound(name.to_string()))?,
        };

        let params = serde_json::json!({ "name": name });
        if let Err(e) = self
            .store
            .put_with_params(Namespace::Geocode, &key, &result, params, None)
        {
            tracing::warn!(name, error = %e, "Failed to write geocode cache");
        }
        tracing::info!(
            name,
            lat = result.latitude,
            lon = result.longitude,
            "Geocode resolved"
        );
        Ok(result)
    }

    async fn resolve_primary(&self, name: &str) -> Result<Option<GeocodeResult>> {
        let query = [
            ("name", name),
            ("count", "1"),
            ("language", "en"),
            ("format", "json"),
        ];
        let response: OpenMeteoSearchResponse = crate::core::http::fetch_json(
            &self.http,
            PRIMARY_SOURCE,
            &self.primary_url,
            &query,
        )
        .await?;

        Ok(response.results.into_iter().next().map(|entry| GeocodeResult {
            name: entry.name.unwrap_or_else(|| name.to_string()),
            latitude: entry.latitude,
            longitude: entry.longitude,
            timezone: entry.timezone.unwrap_or_else(|| "UTC".to_string()),
            country_code: entry.country_code,
            altitude: entry.elevation,
        }))
    }

    async fn resolve_secondary(&self, name: &str) -> Result<Option<GeocodeResult>> {
        let Some(api_key) = self.google_api_key.as_deref() else {
            tracing::warn!(
                name,
                "GOOGLE_API_KEY not set; no secondary geocoding provider available"
            );
            return Ok(None);
        };

        tracing::info!(name, "Falling back to secondary geocoding");
        let query = [("address", name), ("key", api_key)];
        let response: GoogleGeocodeResponse = crate::core::http::fetch_json(
            &self.http,
            SECONDARY_SOURCE,
            &self.secondary_url,
            &query,
        )
        .await?;

        if response.status != "OK" {
            tracing::warn!(name, status = %response.status, "Secondary geocoding returned no result");
            return Ok(None);
        }
        let Some(entry) = response.results.into_iter().next() else {
            return Ok(None);
        };

        let latitude = entry.geometry.location.lat;
        let longitude = entry.geometry.location.lng;
        let timezone = self
            .lookup_timezone(latitude, longitude, api_key)
            .await
            .unwrap_or_else(|| "UTC".to_string());
        let country_code = entry
            .address_components
            .iter()
            .find(|component| component.types.iter().any(|t| t == "country"))
            .and_then(|component| component.short_name.clone());

        Ok(Some(GeocodeResult {
            name: entry.formatted_address.unwrap_or_else(|| name.to_string()),
            latitude,
            longitude,
            timezone,
            country_code,
            altitude: None,
        }))
    }

    /// The secondary provider has no timezone in its geocode payload, so
    /// a separate timezone lookup fills it in. Best-effort.
    async fn lookup_timezone(&self, latitude: f64, longitude: f64, api_key: &str) -> Option<String> {
        let location = format!("{latitude},{longitude}");
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let query = [
            ("location", location.as_str()),
            ("timestamp", timestamp.as_str()),
            ("key", api_key),
        ];
        let response: GoogleTimezoneResponse = crate::core::http::fetch_json(
            &self.http,
            SECONDARY_SOURCE,
            &self.timezone_url,
            &query,
        )
        .await
        .ok()?;
        if response.status == "OK" {
            response.time_zone_id
        } else {
            None
        }
    }
}
