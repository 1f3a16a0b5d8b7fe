//! Integration tests for common Pennant workflows.
//!
//! These tests verify that the most common use cases work correctly.

use pennant::prelude::*;
use pennant::{ConfigurationFormat, LoadOrigin};
use std::path::Path;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// =============================================================================
// Static Configuration
// =============================================================================

#[test]
fn test_static_document_workflow() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "features.toml",
        r#"
        [[features]]
        name = "dark_mode"
        enabled = true

        [[features]]
        name = "checkout_flow"
        test-variations = ["A", "B"]
        test-biases = [0, 100]
        labels = ["Classic", "Streamlined"]
        "#,
    );

    let resolver = StaticResolver::from_file(&path).unwrap();
    resolver.log_summary();
    let client = FlagClient::new(resolver);

    assert!(client.is_enabled("dark_mode"));
    assert!(!client.is_enabled("unknown_feature"));
    assert_eq!(client.test_variation("checkout_flow"), Some(TestVariation::new("B")));
    assert_eq!(
        client.variation_label("checkout_flow").as_deref(),
        Some("Streamlined")
    );
    assert!(client.user_is_in_test("checkout_flow", "B"));
}

#[test]
fn test_development_features_follow_mode() {
    let document = r#"[{"name": "new_editor", "enabled": true, "development": true}]"#;

    let production = FlagClient::new(StaticResolver::from_json(document).unwrap());
    let development =
        FlagClient::new(StaticResolver::from_json(document).unwrap().with_development(true));

    assert!(!production.is_enabled("new_editor"));
    assert!(development.is_enabled("new_editor"));
}

// =============================================================================
// Remote Configuration with Local Layers
// =============================================================================

#[tokio::test]
async fn test_remote_document_from_file_location() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let remote = write(
        dir.path(),
        "remote.json",
        r#"{"features": [{"name": "dark_mode", "enabled": true}]}"#,
    );
    let fallback = write(
        dir.path(),
        "local.json",
        r#"[{"name": "dark_mode", "enabled": true, "development": true},
            {"name": "debug_menu", "enabled": true}]"#,
    );

    let config = ResolverConfig::new()
        .with_configuration_url(remote.to_string_lossy())
        .with_fallback_path(&fallback)
        .with_cache_dir(dir.path().join("cache"));
    assert_eq!(config.format(), ConfigurationFormat::Json);

    let resolver = RemoteResolver::from_config(&config).unwrap();
    let outcome = resolver.refresh().await.unwrap();
    assert_eq!(outcome.origin, LoadOrigin::Remote);
    assert_eq!(outcome.features, 2);

    let client = FlagClient::new(resolver.clone());
    // The fallback marks dark_mode as still under development
    assert!(!client.is_enabled("dark_mode"));
    assert!(client.is_enabled("debug_menu"));

    let development = FlagClient::new(resolver.with_development(true));
    assert!(development.is_enabled("dark_mode"));
}

#[tokio::test]
async fn test_bundled_defaults_when_offline() {
    let dir = tempfile::tempdir().unwrap();
    let bundled = write(
        dir.path(),
        "defaults.json",
        r#"[{"name": "dark_mode", "enabled": false}]"#,
    );

    let config = ResolverConfig::new()
        .with_configuration_url(dir.path().join("missing.json").to_string_lossy())
        .with_bundled_path(&bundled)
        .with_cache_dir(dir.path().join("cache"));
    let resolver = RemoteResolver::from_config(&config).unwrap();

    let outcome = resolver.refresh().await.unwrap();
    assert_eq!(outcome.origin, LoadOrigin::Bundled);
    assert!(!resolver.is_enabled("dark_mode"));
    assert!(resolver.feature("dark_mode").is_some());
}

// =============================================================================
// Process-wide Default and Test Double
// =============================================================================

#[test]
fn test_default_client_with_test_double() {
    let double = TestDouble::new()
        .with_flag("dark_mode", true)
        .with_assignment("checkout_flow", "B")
        .with_label("checkout_flow", "Streamlined");
    client::set_default(FlagClient::new(double.clone()));

    assert!(pennant::is_enabled("dark_mode"));
    assert_eq!(pennant::variation_label("checkout_flow").as_deref(), Some("Streamlined"));
    assert!(pennant::user_is_in_test("checkout_flow", "B"));
    assert_eq!(double.call_count(), 3);

    double.set_flag("dark_mode", false);
    assert!(!pennant::is_enabled("dark_mode"));

    client::clear_default();
    assert!(!pennant::is_enabled("dark_mode"));
    assert_eq!(pennant::test_variation("checkout_flow"), None);
    assert_eq!(double.call_count(), 4);
}
