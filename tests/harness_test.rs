//! The probe harness against a mocked local provider.

use std::sync::Arc;

use omnillm::{
    AdapterFactory, ProbeHarness, ProbeStatus, ProbeSummary, ProviderSettings, StaticCredentials,
    StaticSettings,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ollama_factory(base_url: &str) -> AdapterFactory {
    let resolver = StaticSettings::new().insert(
        "ollama",
        ProviderSettings::new(base_url)
            .with_model("llama3")
            .with_timeout_seconds(5),
    );
    AdapterFactory::with_builtin_providers(Arc::new(resolver), Arc::new(StaticCredentials::new()))
}

#[tokio::test]
async fn test_probe_success_records_timing_and_preview() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3",
            "message": {"role": "assistant", "content": "OK"},
            "done": true,
            "done_reason": "stop",
        })))
        .mount(&server)
        .await;

    let harness = ProbeHarness::new(ollama_factory(&server.uri()));
    let report = harness.probe("ollama", None, None).await;

    assert_eq!(report.status, ProbeStatus::Success);
    assert_eq!(report.provider, "ollama");
    assert_eq!(report.model.as_deref(), Some("llama3"));
    assert_eq!(report.response_preview.as_deref(), Some("OK"));
    assert!(report.health_check_duration.is_some());
    assert!(report.chat_duration.is_some());
    assert!(report.error.is_none());
    assert_eq!(report.capabilities.unwrap().provider, "ollama");
}

#[tokio::test]
async fn test_probe_unhealthy_skips_generation() {
    // No /api/tags mock: the health check gets a 404 and generation is
    // never attempted.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let harness = ProbeHarness::new(ollama_factory(&server.uri()));
    let report = harness.probe("ollama", None, None).await;

    assert_eq!(report.status, ProbeStatus::Unhealthy);
    assert!(report.health_check_duration.is_some());
    assert!(report.chat_duration.is_none());
    assert_eq!(report.error.as_deref(), Some("health check failed"));
}

#[tokio::test]
async fn test_probe_failure_is_contained_per_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3",
            "message": {"role": "assistant", "content": "OK"},
            "done": true,
        })))
        .mount(&server)
        .await;

    let harness = ProbeHarness::new(ollama_factory(&server.uri()));

    // A provider with no settings fails with an error report...
    let failed = harness.probe("anthropic", None, None).await;
    assert_eq!(failed.status, ProbeStatus::Error);
    assert!(failed.error.is_some());

    // ...and a subsequent probe of a working provider is unaffected.
    let succeeded = harness.probe("ollama", None, None).await;
    assert_eq!(succeeded.status, ProbeStatus::Success);
}

#[tokio::test]
async fn test_probe_all_reports_every_registered_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3",
            "message": {"role": "assistant", "content": "OK"},
            "done": true,
        })))
        .mount(&server)
        .await;

    let harness = ProbeHarness::new(ollama_factory(&server.uri()));
    let reports = harness.probe_all().await;

    // One record per registered provider, in stable registry order.
    let providers: Vec<&str> = reports.iter().map(|r| r.provider.as_str()).collect();
    assert_eq!(providers, vec!["anthropic", "gemini", "ollama", "openai"]);

    let summary = ProbeSummary::from_reports(&reports);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.succeeded, 1);
    // The hosted providers have no settings in this run and fail cleanly.
    assert_eq!(summary.failed, 3);
}
