//! End-to-end pipeline tests with every external interface faked.
//!
//! Exercises the task state machine against wiremock: successful
//! generation, degraded fallback on provider failure, sibling isolation
//! when one target fails, and refresh-gate skipping on a second run.

mod common;

use std::collections::HashMap;

use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wxgen::config::{EntryOverrides, ForecastConfig, LocationConfig};
use wxgen::core::executor::{CancelFlag, Executor, ResultSource, TaskOutcome};
use wxgen::core::http::default_client;
use wxgen::providers::{Credentials, LlmClient, ProviderFamily};
use wxgen::sources::{AlertSource, GeocodeSource, WeatherSource};
use wxgen::storage::{AppPaths, CacheStore};
use wxgen::test_utils::make_test_forecast_payload;

use common::logger::TestLogger;

fn location(name: &str) -> LocationConfig {
    LocationConfig {
        name: name.to_string(),
        overrides: EntryOverrides::default(),
    }
}

fn config_with(locations: Vec<LocationConfig>, refresh_interval: Option<u64>) -> ForecastConfig {
    ForecastConfig {
        locations,
        defaults: EntryOverrides {
            llm: Some("gpt-5-mini".to_string()),
            refresh_interval_minutes: refresh_interval,
            ..EntryOverrides::default()
        },
        ..ForecastConfig::default()
    }
}

fn build_executor(
    server: &MockServer,
    tmp: &TempDir,
    config: ForecastConfig,
    force: bool,
) -> Executor {
    let store = CacheStore::new(tmp.path());
    let http = default_client().expect("client");
    let llm = LlmClient::new(Credentials::from_keys(HashMap::from([(
        ProviderFamily::OpenAi,
        "test-key".to_string(),
    )])))
    .expect("llm client")
    .with_base_url(ProviderFamily::OpenAi, server.uri());

    Executor::new(
        config,
        store.clone(),
        AppPaths::with_root(tmp.path()),
        llm,
        WeatherSource::new(http.clone(), store.clone()).with_base_url(&server.uri()),
        GeocodeSource::new(http.clone(), store.clone(), None).with_base_url(&server.uri()),
        AlertSource::new(http, store, None).with_base_url(&server.uri()),
        2,
        force,
        CancelFlag::new(),
    )
}

async fn mount_geocode(server: &MockServer, name: &str, found: bool) {
    let body = if found {
        serde_json::json!({
            "results": [{
                "name": name,
                "latitude": -41.3,
                "longitude": 174.8,
                "timezone": "UTC",
                "country_code": "NZ"
            }]
        })
    } else {
        serde_json::json!({ "results": [] })
    };
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("name", name))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_weather(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/ensemble"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(make_test_forecast_payload(12, 2)),
        )
        .mount(server)
        .await;
}

async fn mount_chat_completion(server: &MockServer, status: u16, text: &str) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": { "content": text },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 1200, "completion_tokens": 300 }
        }))
    } else {
        ResponseTemplate::new(status).set_body_string("upstream exploded")
    };
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn successful_run_renders_generated_text() {
    let log = TestLogger::new("successful_run_renders_generated_text");
    log.phase("setup");

    let server = MockServer::start().await;
    mount_geocode(&server, "Wellington", true).await;
    mount_weather(&server).await;
    mount_chat_completion(&server, 200, "**Monday:** Westerlies easing, high near 15°C.").await;

    let tmp = TempDir::new().unwrap();
    let executor = build_executor(&server, &tmp, config_with(vec![location("Wellington")], None), false);

    log.phase("execute");
    let (outcomes, summary) = executor.run().await.expect("run");

    log.phase("verify");
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        TaskOutcome::Rendered(result) => {
            assert_eq!(result.source, ResultSource::Generated);
            assert!(!result.degraded);
            assert!(result.text.contains("Westerlies easing"));
            assert_eq!(result.provider.as_deref(), Some("openai"));
            assert!(result.cost_cents.is_some());
        }
        other => panic!("expected rendered outcome, got {other:?}"),
    }
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.exit_code(), wxgen::ExitCode::Success);
    log.finish_ok();
}

#[tokio::test]
async fn generation_failure_degrades_to_dataset_preview() {
    let log = TestLogger::new("generation_failure_degrades_to_dataset_preview");
    log.phase("setup");

    let server = MockServer::start().await;
    mount_geocode(&server, "Wellington", true).await;
    mount_weather(&server).await;
    mount_chat_completion(&server, 500, "").await;

    let tmp = TempDir::new().unwrap();
    let executor = build_executor(&server, &tmp, config_with(vec![location("Wellington")], None), false);

    log.phase("execute");
    let (outcomes, summary) = executor.run().await.expect("run");

    log.phase("verify");
    match &outcomes[0] {
        TaskOutcome::Rendered(result) => {
            assert_eq!(result.source, ResultSource::DegradedFallback);
            assert!(result.degraded);
            assert!(result.text.contains("Dataset preview"));
            assert!(result.text.contains("Hours captured"));
        }
        other => panic!("expected rendered outcome, got {other:?}"),
    }
    // Degraded counts as a soft success.
    assert_eq!(summary.degraded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.exit_code(), wxgen::ExitCode::Success);
    log.finish_ok();
}

#[tokio::test]
async fn failed_target_does_not_abort_siblings() {
    let log = TestLogger::new("failed_target_does_not_abort_siblings");
    log.phase("setup");

    let server = MockServer::start().await;
    mount_geocode(&server, "Wellington", true).await;
    // No geocode result and no secondary provider: this target fails.
    mount_geocode(&server, "Atlantis", false).await;
    mount_weather(&server).await;
    mount_chat_completion(&server, 200, "**Monday:** Fine.").await;

    let tmp = TempDir::new().unwrap();
    let executor = build_executor(
        &server,
        &tmp,
        config_with(vec![location("Wellington"), location("Atlantis")], None),
        false,
    );

    log.phase("execute");
    let (outcomes, summary) = executor.run().await.expect("run");

    log.phase("verify");
    assert_eq!(outcomes.len(), 2);
    let rendered = outcomes
        .iter()
        .filter(|o| matches!(o, TaskOutcome::Rendered(_)))
        .count();
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, TaskOutcome::Failed { .. }))
        .count();
    assert_eq!(rendered, 1);
    assert_eq!(failed, 1);
    assert_eq!(summary.exit_code(), wxgen::ExitCode::GeneralError);
    log.finish_ok();
}

#[tokio::test]
async fn second_run_within_refresh_interval_is_skipped() {
    let log = TestLogger::new("second_run_within_refresh_interval_is_skipped");
    log.phase("setup");

    let server = MockServer::start().await;
    mount_geocode(&server, "Wellington", true).await;
    mount_weather(&server).await;
    mount_chat_completion(&server, 200, "**Monday:** Settled.").await;

    let tmp = TempDir::new().unwrap();
    let config = config_with(vec![location("Wellington")], Some(60));

    log.phase("first run");
    let executor = build_executor(&server, &tmp, config.clone(), false);
    let (_, first_summary) = executor.run().await.expect("first run");
    assert_eq!(first_summary.generated, 1);

    log.phase("second run");
    let executor = build_executor(&server, &tmp, config.clone(), false);
    let (outcomes, summary) = executor.run().await.expect("second run");
    assert_eq!(summary.skipped, 1);
    assert!(matches!(outcomes[0], TaskOutcome::Skipped { .. }));

    log.phase("forced run");
    let executor = build_executor(&server, &tmp, config, true);
    let (_, forced) = executor.run().await.expect("forced run");
    assert_eq!(forced.generated, 1);
    assert_eq!(forced.skipped, 0);
    log.finish_ok();
}
