//! Integration tests for pennant-features

use pennant_features::*;
use std::sync::Arc;
use std::thread;

fn scenario_client() -> FlagClient {
    let resolver = StaticResolver::from_json(
        r#"{"features": [
            {"name": "dark_mode", "enabled": true},
            {"name": "checkout_flow", "test-variations": ["A", "B"],
             "test-biases": [0, 100], "labels": ["Classic", "Streamlined"]}
        ]}"#,
    )
    .unwrap();
    FlagClient::new(resolver)
}

#[test]
fn test_dark_mode_scenario() {
    let client = scenario_client();
    assert!(client.is_enabled("dark_mode"));
    assert!(!client.is_enabled("unknown_feature"));
}

#[test]
fn test_checkout_flow_scenario() {
    let client = scenario_client();
    assert_eq!(client.test_variation("checkout_flow"), Some(TestVariation::new("B")));
    assert_eq!(
        client.variation_label("checkout_flow").as_deref(),
        Some("Streamlined")
    );
    assert!(client.user_is_in_test("checkout_flow", "B"));
    assert!(!client.user_is_in_test("checkout_flow", "A"));
}

#[test]
fn test_unknown_identifiers_never_fail() {
    let client = scenario_client();
    assert!(!client.is_enabled(""));
    assert_eq!(client.test_variation("unknown_test"), None);
    assert_eq!(client.variation_label("unknown_test"), None);
    assert!(!client.user_is_in_test("unknown_test", "B"));
    assert!(!client.user_is_in_test("", ""));
}

#[test]
fn test_user_is_in_test_matches_exactly_the_assignment() {
    let client = FlagClient::new(
        StaticResolver::builder()
            .test("layout", ["Grid", "List", "Cards"])
            .assign("layout", "List")
            .build(),
    );

    for variation in ["Grid", "List", "Cards"] {
        assert_eq!(client.user_is_in_test("layout", variation), variation == "List");
    }
    assert!(client.user_is_in_test("layout", "LIST"));
}

#[test]
fn test_repeated_queries_are_idempotent() {
    let client = scenario_client();
    let answers: Vec<bool> = (0..10).map(|_| client.is_enabled("dark_mode")).collect();
    assert!(answers.iter().all(|enabled| *enabled));

    let first = client.test_variation("checkout_flow");
    assert!((0..10).all(|_| client.test_variation("checkout_flow") == first));
}

#[test]
fn test_concurrent_callers_agree() {
    let client = scenario_client();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            thread::spawn(move || {
                (0..100).all(|_| client.is_enabled("dark_mode"))
                    && (0..100).all(|_| client.user_is_in_test("checkout_flow", "B"))
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

#[test]
fn test_concurrent_reads_during_overrides() {
    let resolver = StaticResolver::builder().flag("dark_mode", true).build();
    let client = FlagClient::new(resolver.clone());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    // Either answer is valid while a writer flips the flag
                    let _ = client.is_enabled("dark_mode");
                }
            })
        })
        .collect();

    for i in 0..200 {
        resolver.set_enabled("dark_mode", i % 2 == 0);
    }
    for reader in readers {
        reader.join().unwrap();
    }
    assert!(!client.is_enabled("dark_mode"));
}

#[test]
fn test_disabled_test_reports_disabled_variation() {
    let client = FlagClient::new(
        StaticResolver::from_json(
            r#"[{"name": "checkout_flow", "enabled": false,
                 "test-variations": ["A", "B"], "labels": ["Classic", "Streamlined"]}]"#,
        )
        .unwrap(),
    );

    assert_eq!(client.test_variation("checkout_flow"), Some(TestVariation::disabled()));
    assert_eq!(client.variation_label("checkout_flow"), None);
    assert!(!client.user_is_in_test("checkout_flow", "A"));
    assert!(client.user_is_in_test("checkout_flow", "Disabled"));
}

#[test]
fn test_membership_agrees_with_reported_variation() {
    let resolver = StaticResolver::from_json(
        r#"[
            {"name": "running", "test-variations": ["A", "B"], "test-biases": [100, 0]},
            {"name": "stopped", "enabled": false, "test-variations": ["A", "B"]},
            {"name": "pinned", "test-variations": ["A", "B", "C"]},
            {"name": "pinned_stopped", "enabled": false, "test-variations": ["A", "B"]},
            {"name": "rollout", "test-variations": ["Enabled", "Disabled"]},
            {"name": "dark_mode", "enabled": false}
        ]"#,
    )
    .unwrap();
    resolver.set_test_variation("pinned", "C");
    resolver.set_test_variation("pinned_stopped", "B");
    resolver.set_test_variation("rollout", "Disabled");
    resolver.set_test_variation("dark_mode", "Enabled");

    let client = FlagClient::new(resolver);
    let names = [
        "running",
        "stopped",
        "pinned",
        "pinned_stopped",
        "rollout",
        "dark_mode",
    ];
    for name in names {
        let variation = client
            .test_variation(name)
            .unwrap_or_else(|| panic!("{name} has no variation"));
        assert!(client.user_is_in_test(name, variation.as_str()), "{name}: {variation}");
        for other in ["A", "B", "C", "Enabled", "Disabled"] {
            assert_eq!(
                client.user_is_in_test(name, other),
                variation == other,
                "{name}: {other}"
            );
        }
    }

    assert!(client.is_enabled("dark_mode"));
    assert!(!client.is_enabled("rollout"));
    assert_eq!(client.test_variation("unknown_test"), None);
    assert!(!client.user_is_in_test("unknown_test", "A"));
}

#[test]
fn test_subject_bucketing_is_stable_across_loads() {
    let document = br#"[{"name": "checkout_flow", "test-variations": ["A", "B", "C"]}]"#;
    let strategy = AssignmentStrategy::Subject("user-1234".to_string());

    let first = parse::parse_features(document, ConfigurationFormat::Json, &strategy).unwrap();
    let second = parse::parse_features(document, ConfigurationFormat::Json, &strategy).unwrap();
    assert_eq!(first[0].test_variation(), second[0].test_variation());
    assert_eq!(
        first[0].test_variation_assignment(),
        Percentage::bucket(&FeatureName::new("checkout_flow"), "user-1234")
    );
}

#[test]
fn test_toml_and_json_documents_agree() {
    let json = StaticResolver::from_json(
        r#"[{"name": "onboarding", "test-variations": ["On", "Off"], "test-biases": [100, 0]}]"#,
    )
    .unwrap();
    let toml = StaticResolver::from_toml(
        r#"
        [[features]]
        name = "onboarding"
        test-variations = ["On", "Off"]
        test-biases = [100, 0]
        "#,
    )
    .unwrap();

    assert!(json.is_enabled("onboarding"));
    assert!(toml.is_enabled("onboarding"));
    assert_eq!(json.test_variation("onboarding"), toml.test_variation("onboarding"));
    assert_eq!(
        json.feature("onboarding").unwrap().feature_type(),
        FeatureType::FeatureTest(TestKind::FeatureFlagAb)
    );
}

#[test]
fn test_resolvers_are_interchangeable() {
    let resolvers: Vec<Arc<dyn Resolver>> = vec![
        Arc::new(
            StaticResolver::builder()
                .flag("dark_mode", true)
                .test("checkout_flow", ["A", "B"])
                .assign("checkout_flow", "B")
                .build(),
        ),
        Arc::new(
            TestDouble::new()
                .with_flag("dark_mode", true)
                .with_assignment("checkout_flow", "B"),
        ),
    ];

    for resolver in resolvers {
        let client = FlagClient::from_arc(resolver);
        assert!(client.is_enabled("dark_mode"));
        assert!(client.user_is_in_test("checkout_flow", "B"));
        assert!(!client.is_enabled("unknown_feature"));
    }
}

#[test]
fn test_file_source_feeds_remote_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("features.json");
    std::fs::write(&document, r#"[{"name": "dark_mode", "enabled": true}]"#).unwrap();

    let resolver = RemoteResolver::new(
        Arc::new(FileSource::new(&document)),
        ConfigurationLoader::new(ConfigurationFormat::Json)
            .with_cache(ConfigurationCache::in_dir(dir.path().join("cache"))),
    );
    let outcome = tokio_test::block_on(resolver.refresh()).unwrap();
    assert_eq!(outcome.origin, LoadOrigin::Remote);
    assert!(resolver.is_enabled("dark_mode"));

    std::fs::remove_file(&document).unwrap();
    let outcome = tokio_test::block_on(resolver.refresh()).unwrap();
    assert_eq!(outcome.origin, LoadOrigin::Cache);
    assert!(resolver.is_enabled("dark_mode"));
}
