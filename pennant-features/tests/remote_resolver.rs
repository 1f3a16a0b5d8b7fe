//! RemoteResolver against a mock HTTP server

#![cfg(feature = "remote")]

use pennant_features::*;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOCUMENT: &str = r#"{"features": [
    {"name": "dark_mode", "enabled": true},
    {"name": "checkout_flow", "test-variations": ["A", "B"],
     "test-biases": [0, 100], "labels": ["Classic", "Streamlined"]}
]}"#;

async fn serve(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path("/features.json"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

fn config(server: &MockServer, cache_dir: &std::path::Path) -> ResolverConfig {
    ResolverConfig::new()
        .with_configuration_url(format!("{}/features.json", server.uri()))
        .with_cache_dir(cache_dir)
        .with_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn test_fetches_and_serves_document() {
    let server = MockServer::start().await;
    serve(&server, 200, DOCUMENT).await;
    let dir = tempfile::tempdir().unwrap();

    let resolver = RemoteResolver::from_config(&config(&server, dir.path())).unwrap();
    let outcome = resolver.refresh().await.unwrap();
    assert_eq!(outcome.origin, LoadOrigin::Remote);
    assert_eq!(outcome.features, 2);
    assert!(outcome.fingerprint.is_some());

    let client = FlagClient::new(resolver);
    assert!(client.is_enabled("dark_mode"));
    assert_eq!(client.test_variation("checkout_flow"), Some(TestVariation::new("B")));
    assert_eq!(
        client.variation_label("checkout_flow").as_deref(),
        Some("Streamlined")
    );
    assert!(dir.path().join("features.json").is_file());
}

#[tokio::test]
async fn test_server_error_uses_cache() {
    let dir = tempfile::tempdir().unwrap();

    let healthy = MockServer::start().await;
    serve(&healthy, 200, DOCUMENT).await;
    RemoteResolver::from_config(&config(&healthy, dir.path()))
        .unwrap()
        .refresh()
        .await
        .unwrap();

    let failing = MockServer::start().await;
    serve(&failing, 503, "unavailable").await;
    let resolver = RemoteResolver::from_config(&config(&failing, dir.path())).unwrap();

    let outcome = resolver.refresh().await.unwrap();
    assert_eq!(outcome.origin, LoadOrigin::Cache);
    assert!(resolver.is_enabled("dark_mode"));
}

#[tokio::test]
async fn test_unreachable_server_without_layers_keeps_state() {
    let server = MockServer::start().await;
    serve(&server, 404, "").await;
    let dir = tempfile::tempdir().unwrap();

    let resolver = RemoteResolver::from_config(&config(&server, dir.path())).unwrap();
    let err = resolver.refresh().await.unwrap_err();
    assert!(matches!(err, FlagError::NoConfiguration));
    assert!(!resolver.is_enabled("dark_mode"));
    assert_eq!(resolver.test_variation("checkout_flow"), None);
}

#[tokio::test]
async fn test_assignment_is_sticky_across_restarts() {
    let server = MockServer::start().await;
    serve(
        &server,
        200,
        r#"[{"name": "layout", "test-variations": ["Grid", "List", "Cards"]}]"#,
    )
    .await;
    let dir = tempfile::tempdir().unwrap();

    let first = RemoteResolver::from_config(&config(&server, dir.path())).unwrap();
    first.refresh().await.unwrap();
    let assigned = first.test_variation("layout");

    let restarted = RemoteResolver::from_config(&config(&server, dir.path())).unwrap();
    restarted.refresh().await.unwrap();
    assert_eq!(restarted.test_variation("layout"), assigned);
}

#[tokio::test]
async fn test_toml_document_detected_from_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/features.toml"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("[[features]]\nname = \"dark_mode\"\nenabled = true\n"),
        )
        .mount(&server)
        .await;

    let config = ResolverConfig::new().with_configuration_url(format!("{}/features.toml", server.uri()));
    assert_eq!(config.format(), ConfigurationFormat::Toml);

    let resolver = RemoteResolver::from_config(&config).unwrap();
    resolver.refresh().await.unwrap();
    assert!(resolver.is_enabled("dark_mode"));
}

#[tokio::test]
async fn test_http_source_status_error() {
    let server = MockServer::start().await;
    serve(&server, 500, "boom").await;

    let source = HttpSource::new(format!("{}/features.json", server.uri()), Duration::from_secs(2)).unwrap();
    let err = source.fetch().await.unwrap_err();
    assert!(matches!(err, FlagError::Fetch { .. }));
    assert!(err.to_string().contains("500"));
}
