//! Integration tests for the Open-Meteo client against wiremock.
//!
//! Verifies the cache-checked fetch path: fresh hits skip the network,
//! server errors retry then degrade to a stale entry, and malformed
//! payloads classify as fetch errors.

mod common;

use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wxgen::config::{ForecastConfig, SettingsBag};
use wxgen::core::http::default_client;
use wxgen::error::WxError;
use wxgen::sources::{ForecastRequest, WeatherSource};
use wxgen::storage::CacheStore;
use wxgen::test_utils::make_test_forecast_payload;

use common::logger::TestLogger;

fn make_request() -> ForecastRequest {
    let settings = SettingsBag::resolve(&ForecastConfig::default(), None, None).expect("settings");
    ForecastRequest::from_settings(&settings, -41.2889, 174.7772, "Pacific/Auckland")
}

fn make_source(server: &MockServer, tmp: &TempDir) -> WeatherSource {
    let store = CacheStore::new(tmp.path());
    WeatherSource::new(default_client().expect("client"), store).with_base_url(&server.uri())
}

#[tokio::test]
async fn fetch_downloads_and_caches() {
    let log = TestLogger::new("fetch_downloads_and_caches");
    log.phase("setup");

    let server = MockServer::start().await;
    let payload = make_test_forecast_payload(6, 2);

    // Expect exactly one network hit; the second fetch must be served
    // from cache.
    Mock::given(method("GET"))
        .and(path("/v1/ensemble"))
        .and(query_param("models", "ecmwf_ifs025"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&payload))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let source = make_source(&server, &tmp);
    let request = make_request();

    log.phase("execute");
    let first = source.fetch(&request).await.expect("first fetch");
    let second = source.fetch(&request).await.expect("second fetch");

    log.phase("verify");
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert!(!second.stale);
    assert_eq!(first.raw["hourly"]["time"], second.raw["hourly"]["time"]);
    log.finish_ok();
}

#[tokio::test]
async fn deterministic_models_use_forecast_endpoint() {
    let log = TestLogger::new("deterministic_models_use_forecast_endpoint");
    log.phase("setup");

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("models", "ecmwf_ifs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(make_test_forecast_payload(4, 0)))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let source = make_source(&server, &tmp);
    let mut request = make_request();
    request.model_id = "ecmwf_ifs".to_string();
    request.model_kind = wxgen::config::ModelKind::Deterministic;

    log.phase("execute");
    let payload = source.fetch(&request).await.expect("fetch");

    log.phase("verify");
    assert!(!payload.from_cache);
    log.finish_ok();
}

#[tokio::test]
async fn server_errors_retry_then_fail_without_cache() {
    let log = TestLogger::new("server_errors_retry_then_fail_without_cache");
    log.phase("setup");

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/ensemble"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let source = make_source(&server, &tmp);

    log.phase("execute");
    let result = source.fetch(&make_request()).await;

    log.phase("verify");
    match result {
        Err(WxError::FetchStatus { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected FetchStatus error, got {other:?}"),
    }
    log.finish_ok();
}

#[tokio::test]
async fn expired_cache_serves_as_degraded_fallback() {
    let log = TestLogger::new("expired_cache_serves_as_degraded_fallback");
    log.phase("setup");

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/ensemble"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let store = CacheStore::new(tmp.path());
    let request = make_request();

    // Plant an entry older than the freshness window but inside the
    // purge horizon.
    let stale = wxgen::storage::CacheEnvelope {
        payload: make_test_forecast_payload(6, 2),
        created_at: chrono::Utc::now() - chrono::Duration::hours(2),
        local_date: None,
        params: serde_json::Value::Null,
    };
    store
        .write_envelope(
            wxgen::storage::Namespace::Forecast,
            &request.cache_key(),
            &stale,
        )
        .unwrap();

    let source = WeatherSource::new(default_client().expect("client"), store)
        .with_base_url(&server.uri());

    log.phase("execute");
    let payload = source.fetch(&request).await.expect("stale fallback");

    log.phase("verify");
    assert!(payload.from_cache);
    assert!(payload.stale);
    log.finish_ok();
}

#[tokio::test]
async fn malformed_payload_is_a_fetch_error() {
    let log = TestLogger::new("malformed_payload_is_a_fetch_error");
    log.phase("setup");

    let server = MockServer::start().await;
    // Valid JSON, wrong shape: retries stop immediately (not retryable).
    Mock::given(method("GET"))
        .and(path("/v1/ensemble"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"oops": true})))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let source = make_source(&server, &tmp);

    log.phase("execute");
    let result = source.fetch(&make_request()).await;

    log.phase("verify");
    assert!(matches!(result, Err(WxError::FetchMalformed { .. })));
    log.finish_ok();
}
