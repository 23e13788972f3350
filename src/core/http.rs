//! HTTP client utilities.
//!
//! Provides shared, timeout-bounded HTTP clients for all fetchers.
//! Every outbound call in the pipeline goes through a client built here,
//! so nothing can block without a deadline.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use serde::Serialize;

use crate::error::{Result, WxError};

/// Default timeout for data-source requests (weather, geocode, alerts).
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for LLM calls, which legitimately run much longer.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("wxgen/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| WxError::FetchNetwork {
            source_name: "http-client".to_string(),
            message: e.to_string(),
        })
}

/// Get or create a default data-source client.
pub fn default_client() -> Result<Client> {
    build_client(FETCH_TIMEOUT)
}

/// Fetch JSON from a URL with query parameters.
///
/// # Errors
///
/// Non-2xx statuses, timeouts, and malformed JSON all classify as fetch
/// errors against `source_name`.
pub async fn fetch_json<T: serde::de::DeserializeOwned, Q: Serialize + ?Sized>(
    client: &Client,
    source_name: &str,
    url: &str,
    query: &Q,
) -> Result<T> {
    let response = client.get(url).query(query).send().await.map_err(|e| {
        if e.is_timeout() {
            WxError::FetchTimeout {
                source_name: source_name.to_string(),
                seconds: FETCH_TIMEOUT.as_secs(),
            }
        } else {
            WxError::FetchNetwork {
                source_name: source_name.to_string(),
                message: e.to_string(),
            }
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(WxError::FetchStatus {
            source_name: source_name.to_string(),
            status: status.as_u16(),
        });
    }

    response.json().await.map_err(|e| WxError::FetchMalformed {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}
