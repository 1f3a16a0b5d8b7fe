//! Resolvers answer feature questions for a [`FlagClient`](crate::FlagClient).
//!
//! [`StaticResolver`] serves a fixed, in-memory configuration: definitions
//! parsed from JSON or TOML, read from a file, or built in code.

use crate::error::Result;
use crate::flag::{AssignmentStrategy, Feature, TestVariation};
use crate::parse::{self, ConfigurationFormat};
use crate::store::FeatureStore;
use std::path::Path;
use tracing::{debug, info};

/// Source of answers for the four feature questions.
///
/// Implementations never fail: unknown names are `false` or `None`.
pub trait Resolver: Send + Sync {
    /// Whether the named feature is active.
    fn is_enabled(&self, feature: &str) -> bool;

    /// The variation the caller is assigned to in the named test.
    fn test_variation(&self, test: &str) -> Option<TestVariation>;

    /// Display label of the caller's current variation.
    fn variation_label(&self, test: &str) -> Option<String>;

    /// Whether the caller's current variation is `variation` (case-insensitive).
    fn user_is_in_test(&self, test: &str, variation: &str) -> bool {
        self.test_variation(test)
            .is_some_and(|assigned| assigned == variation)
    }
}

impl<R: Resolver + ?Sized> Resolver for std::sync::Arc<R> {
    fn is_enabled(&self, feature: &str) -> bool {
        (**self).is_enabled(feature)
    }

    fn test_variation(&self, test: &str) -> Option<TestVariation> {
        (**self).test_variation(test)
    }

    fn variation_label(&self, test: &str) -> Option<String> {
        (**self).variation_label(test)
    }

    fn user_is_in_test(&self, test: &str, variation: &str) -> bool {
        (**self).user_is_in_test(test, variation)
    }
}

/// Answer the four questions from a store.
///
/// Shared by every resolver backed by a [`FeatureStore`].
pub(crate) fn store_is_enabled(store: &FeatureStore, feature: &str, development: bool) -> bool {
    store
        .with_feature(feature, |f| f.is_enabled(development))
        .unwrap_or_else(|| {
            debug!(feature, "Unknown feature, reporting disabled");
            false
        })
}

pub(crate) fn store_test_variation(store: &FeatureStore, test: &str) -> Option<TestVariation> {
    store.with_feature(test, Feature::test_variation).flatten()
}

pub(crate) fn store_variation_label(store: &FeatureStore, test: &str) -> Option<String> {
    store
        .with_feature(test, |f| {
            f.test_variation()
                .and_then(|variation| f.label(&variation).map(str::to_string))
        })
        .flatten()
}

pub(crate) fn store_user_is_in_test(store: &FeatureStore, test: &str, variation: &str) -> bool {
    store_test_variation(store, test).is_some_and(|assigned| assigned == variation)
}

/// Resolver over a fixed configuration held in memory.
///
/// # Examples
///
/// ```
/// use pennant_features::{Resolver, StaticResolver};
///
/// let resolver = StaticResolver::builder()
///     .flag("dark_mode", true)
///     .test("checkout_flow", ["A", "B"])
///     .labels("checkout_flow", [("B", "Streamlined")])
///     .assign("checkout_flow", "B")
///     .build();
///
/// assert!(resolver.is_enabled("dark_mode"));
/// assert_eq!(resolver.variation_label("checkout_flow").as_deref(), Some("Streamlined"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    store: FeatureStore,
    development: bool,
}

impl StaticResolver {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            store: FeatureStore::new(features),
            development: false,
        }
    }

    pub fn builder() -> StaticResolverBuilder {
        StaticResolverBuilder::default()
    }

    /// Parse a JSON document (`{"features": [...]}` or a bare array).
    pub fn from_json(data: &str) -> Result<Self> {
        Self::from_document(data.as_bytes(), ConfigurationFormat::Json)
    }

    /// Parse a TOML document with `[[features]]` tables.
    pub fn from_toml(data: &str) -> Result<Self> {
        Self::from_document(data.as_bytes(), ConfigurationFormat::Toml)
    }

    fn from_document(data: &[u8], format: ConfigurationFormat) -> Result<Self> {
        let features = parse::parse_features(data, format, &AssignmentStrategy::Random)?;
        Ok(Self::new(features))
    }

    /// Read a document from disk; the format follows the file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let features = parse::load_file(path, &AssignmentStrategy::Random)?;
        Ok(Self::new(features))
    }

    /// Features marked `development` are only enabled in development mode.
    pub fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    pub fn is_development(&self) -> bool {
        self.development
    }

    /// Switch a feature on or off; returns `false` for unknown names.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        self.store.set_enabled(name, enabled)
    }

    pub fn set_test_variation(&self, name: &str, variation: impl Into<TestVariation>) -> bool {
        self.store.set_test_variation(name, variation.into())
    }

    pub fn set_unlocked(&self, name: &str, unlocked: bool) -> bool {
        self.store.set_unlocked(name, unlocked)
    }

    pub fn remove_feature(&self, name: &str) -> bool {
        self.store.remove(name)
    }

    /// Swap in a new configuration
    pub fn replace(&self, features: Vec<Feature>) {
        self.store.replace(features);
    }

    pub fn features(&self) -> Vec<Feature> {
        self.store.snapshot()
    }

    pub fn feature(&self, name: &str) -> Option<Feature> {
        self.store.feature(name)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Emit one `info` record per feature.
    pub fn log_summary(&self) {
        log_features(&self.store, self.development);
    }
}

pub(crate) fn log_features(store: &FeatureStore, development: bool) {
    for feature in store.snapshot() {
        let variation = feature.test_variation();
        info!(
            feature = %feature.name(),
            feature_type = %feature.feature_type(),
            enabled = feature.is_enabled(development),
            variation = variation.as_ref().map(TestVariation::as_str),
            assignment = feature.test_variation_assignment(),
            "Feature"
        );
    }
}

impl Resolver for StaticResolver {
    fn is_enabled(&self, feature: &str) -> bool {
        store_is_enabled(&self.store, feature, self.development)
    }

    fn test_variation(&self, test: &str) -> Option<TestVariation> {
        store_test_variation(&self.store, test)
    }

    fn variation_label(&self, test: &str) -> Option<String> {
        store_variation_label(&self.store, test)
    }

    fn user_is_in_test(&self, test: &str, variation: &str) -> bool {
        store_user_is_in_test(&self.store, test, variation)
    }
}

/// Builder for [`StaticResolver`].
#[derive(Debug, Default)]
pub struct StaticResolverBuilder {
    features: Vec<Feature>,
    development: bool,
}

impl StaticResolverBuilder {
    /// Add an on/off flag
    pub fn flag(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.features.push(Feature::flag(name, enabled));
        self
    }

    /// Add an enabled test with equal biases
    pub fn test<I, S>(mut self, name: impl Into<String>, variations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features.push(Feature::test(name, variations));
        self
    }

    /// Add a fully built feature
    pub fn feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    /// Attach labels to variations of an already added test
    pub fn labels<I, V, L>(mut self, test: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<TestVariation>,
        L: Into<String>,
    {
        if let Some(index) = self.position(test) {
            let mut feature = self.features.remove(index);
            for (variation, label) in labels {
                feature = feature.with_label(variation, label);
            }
            self.features.insert(index, feature);
        }
        self
    }

    /// Pin the caller to a variation of an already added test
    pub fn assign(mut self, test: &str, variation: impl Into<TestVariation>) -> Self {
        if let Some(index) = self.position(test) {
            let feature = self.features.remove(index).with_variation(variation);
            self.features.insert(index, feature);
        }
        self
    }

    pub fn development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    pub fn build(self) -> StaticResolver {
        StaticResolver::new(self.features).with_development(self.development)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name() == name)
    }
}
