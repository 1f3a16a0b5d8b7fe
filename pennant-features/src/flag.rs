//! Feature Model
//!
//! Defines features, tests, variations and the per-feature evaluation logic
//! (bias buckets, development gating, labels).

use crate::error::{FlagError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Add;

/// Name of a feature flag or test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureName(String);

impl FeatureName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FeatureName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<str> for FeatureName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for FeatureName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

const ENABLED: &str = "Enabled";
const DISABLED: &str = "Disabled";

/// One arm of a test.
///
/// Variations compare case-insensitively, so `"Group A"` and `"group a"` name
/// the same arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestVariation(String);

impl TestVariation {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The "on" arm of flags and on/off tests.
    pub fn enabled() -> Self {
        Self::new(ENABLED)
    }

    /// The "off" arm, also reported for every disabled test.
    pub fn disabled() -> Self {
        Self::new(DISABLED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_enabled(&self) -> bool {
        self.0.eq_ignore_ascii_case(ENABLED)
    }

    pub fn is_disabled(&self) -> bool {
        self.0.eq_ignore_ascii_case(DISABLED)
    }

    /// The synthetic counterpart used for single-variation definitions (`v` -> `!v`).
    pub fn negated(&self) -> Self {
        Self(format!("!{}", self.0))
    }

    fn folded(&self) -> String {
        self.0.to_lowercase()
    }
}

impl PartialEq for TestVariation {
    fn eq(&self, other: &Self) -> bool {
        self.folded() == other.folded()
    }
}

impl Eq for TestVariation {}

impl Hash for TestVariation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded().hash(state);
    }
}

impl PartialEq<str> for TestVariation {
    fn eq(&self, other: &str) -> bool {
        self.folded() == other.to_lowercase()
    }
}

impl PartialEq<&str> for TestVariation {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl fmt::Display for TestVariation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestVariation {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TestVariation {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A share of the `[0, 100]` line, clamped on construction and addition.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Percentage(f64);

impl Percentage {
    pub const MIN: Percentage = Percentage(0.0);
    pub const MAX: Percentage = Percentage(100.0);

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self::MIN
        } else {
            Self(value.clamp(0.0, 100.0))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Deterministic position in `[0, 100)` for a subject within a feature.
    ///
    /// The same `(feature, subject)` pair always lands on the same point, which
    /// keeps test assignments sticky without any persisted state.
    pub fn bucket(feature: &FeatureName, subject: &str) -> f64 {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(feature.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(subject.as_bytes());
        let digest = hasher.finalize();

        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        // Top 53 bits keep the quotient strictly below 1.0
        let bits = u64::from_be_bytes(prefix) >> 11;
        (bits as f64 / (1u64 << 53) as f64) * 100.0
    }
}

impl Add for Percentage {
    type Output = Percentage;

    fn add(self, rhs: Self) -> Self::Output {
        Percentage::new(self.0 + rhs.0)
    }
}

impl From<f64> for Percentage {
    fn from(value: f64) -> Self {
        Percentage::new(value)
    }
}

impl From<Percentage> for f64 {
    fn from(value: Percentage) -> Self {
        value.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Kind of experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKind {
    /// Two arbitrary arms
    Ab,
    /// Two arms meaning on/off (Enabled/Disabled)
    FeatureFlagAb,
    /// Multivariate, more than two arms
    Mvt,
}

/// Feature classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FeatureType {
    Deprecated,
    FeatureFlag,
    UnlockFlag,
    FeatureTest(TestKind),
}

impl FeatureType {
    /// Document representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deprecated => "deprecated",
            Self::FeatureFlag => "feature-flag",
            Self::UnlockFlag => "unlock-flag",
            Self::FeatureTest(TestKind::Ab) => "ab-test",
            Self::FeatureTest(TestKind::FeatureFlagAb) => "feature-flag-ab-test",
            Self::FeatureTest(TestKind::Mvt) => "mvt-test",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "deprecated" => Some(Self::Deprecated),
            "feature-flag" => Some(Self::FeatureFlag),
            "unlock-flag" => Some(Self::UnlockFlag),
            "ab-test" => Some(Self::FeatureTest(TestKind::Ab)),
            "feature-flag-ab-test" => Some(Self::FeatureTest(TestKind::FeatureFlagAb)),
            "mvt-test" => Some(Self::FeatureTest(TestKind::Mvt)),
            _ => None,
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Self::FeatureTest(_))
    }
}

impl TryFrom<String> for FeatureType {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown feature type `{}`", value))
    }
}

impl From<FeatureType> for String {
    fn from(value: FeatureType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Deprecated => "Deprecated",
            Self::FeatureFlag => "Feature Flag",
            Self::UnlockFlag => "Unlock Flag",
            Self::FeatureTest(TestKind::Ab) => "A/B Test",
            Self::FeatureTest(TestKind::FeatureFlagAb) => "Feature On/Off (A/B) Test",
            Self::FeatureTest(TestKind::Mvt) => "MVT Test",
        };
        f.write_str(text)
    }
}

/// How a test assignment is drawn when a definition does not carry one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AssignmentStrategy {
    /// Uniformly random in `[0, 100)`; stickiness comes from the cache
    #[default]
    Random,
    /// Hash of feature name and subject key
    Subject(String),
}

impl AssignmentStrategy {
    pub fn assign(&self, feature: &FeatureName) -> f64 {
        match self {
            Self::Random => rand::random_range(0.0..100.0),
            Self::Subject(subject) => Percentage::bucket(feature, subject),
        }
    }
}

/// Feature as written in a configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeatureDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    #[serde(default)]
    pub enabled: Option<bool>,

    #[serde(default)]
    pub development: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked: Option<bool>,

    #[serde(default, rename = "type")]
    pub feature_type: Option<FeatureType>,

    #[serde(default)]
    pub test_variations: Option<Vec<String>>,

    #[serde(default)]
    pub test_biases: Option<Vec<f64>>,

    #[serde(default)]
    pub labels: Option<Vec<Option<String>>>,

    #[serde(default)]
    pub test_variation_assignment: Option<f64>,
}

impl FeatureDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A resolved feature: flag, unlock flag or test.
#[derive(Debug, Clone)]
pub struct Feature {
    name: FeatureName,
    description: Option<String>,
    section: Option<String>,
    enabled: bool,
    development: bool,
    unlocked: Option<bool>,
    feature_type: FeatureType,
    test_variations: Vec<TestVariation>,
    test_biases: Vec<Percentage>,
    labels: Vec<Option<String>>,
    test_variation_assignment: f64,
    test_variation_override: Option<TestVariation>,
}

impl Feature {
    /// Build a feature from a document definition.
    ///
    /// Fails only for an empty name. Missing fields are inferred from the
    /// shape of `test-variations`.
    pub fn from_definition(
        definition: FeatureDefinition,
        strategy: &AssignmentStrategy,
    ) -> Result<Self> {
        if definition.name.trim().is_empty() {
            return Err(FlagError::InvalidDefinition(
                "feature name must not be empty".to_string(),
            ));
        }
        Ok(Self::normalize(definition, strategy))
    }

    /// Create a simple on/off feature flag.
    ///
    /// # Examples
    ///
    /// ```
    /// use pennant_features::Feature;
    ///
    /// let flag = Feature::flag("dark_mode", true);
    /// assert!(flag.is_enabled(false));
    /// ```
    pub fn flag(name: impl Into<String>, enabled: bool) -> Self {
        let definition = FeatureDefinition {
            enabled: Some(enabled),
            ..FeatureDefinition::new(name)
        };
        Self::normalize(definition, &AssignmentStrategy::Random)
    }

    /// Create an enabled test over the given variations with equal biases.
    ///
    /// The kind (A/B, on/off, MVT) is inferred from the variations.
    pub fn test<I, S>(name: impl Into<String>, variations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let definition = FeatureDefinition {
            enabled: Some(true),
            test_variations: Some(variations.into_iter().map(Into::into).collect()),
            ..FeatureDefinition::new(name)
        };
        Self::normalize(definition, &AssignmentStrategy::Random)
    }

    fn normalize(definition: FeatureDefinition, strategy: &AssignmentStrategy) -> Self {
        let name = FeatureName::new(definition.name);

        let mut declared_type = definition.feature_type;
        if definition.unlocked.is_some() {
            declared_type = Some(FeatureType::UnlockFlag);
        } else if declared_type == Some(FeatureType::UnlockFlag) {
            declared_type = None;
        }

        let mut assignment = definition
            .test_variation_assignment
            .map(|value| Percentage::new(value).value())
            .unwrap_or_else(|| strategy.assign(&name));

        let defaults = vec![TestVariation::enabled(), TestVariation::disabled()];
        let development = definition.development.unwrap_or(false);

        let (enabled, variations, feature_type) = match definition.test_variations {
            Some(given) if given.len() == 1 => {
                let only = TestVariation::new(given[0].clone());
                let negated = only.negated();
                (
                    definition.enabled.unwrap_or(false),
                    vec![only, negated],
                    declared_type.unwrap_or(FeatureType::FeatureFlag),
                )
            }
            Some(given) if given.len() == 2 => {
                let given: Vec<TestVariation> = given.into_iter().map(TestVariation::new).collect();
                let on_off = contains_all(&given, &["enabled", "disabled"])
                    || contains_all(&given, &["on", "off"]);
                if on_off {
                    let first_is_off = given
                        .first()
                        .map(|v| v == "disabled" || v == "off")
                        .unwrap_or(false);
                    let mut variations = defaults;
                    if first_is_off {
                        variations.reverse();
                    }
                    (
                        definition.enabled.unwrap_or(true),
                        variations,
                        declared_type.unwrap_or(FeatureType::FeatureTest(TestKind::FeatureFlagAb)),
                    )
                } else {
                    (
                        definition.enabled.unwrap_or(true),
                        given,
                        declared_type.unwrap_or(FeatureType::FeatureTest(TestKind::Ab)),
                    )
                }
            }
            Some(given) if given.len() > 2 => (
                definition.enabled.unwrap_or(true),
                given.into_iter().map(TestVariation::new).collect(),
                declared_type.unwrap_or(FeatureType::FeatureTest(TestKind::Mvt)),
            ),
            // Absent or empty: a plain flag pinned to its Enabled/Disabled arm
            _ => {
                let enabled = definition.enabled.unwrap_or(false);
                assignment = if enabled { 1.0 } else { 99.0 };
                (
                    enabled,
                    defaults,
                    declared_type.unwrap_or(FeatureType::FeatureFlag),
                )
            }
        };

        let test_biases = normalize_biases(definition.test_biases, variations.len());
        let labels = definition
            .labels
            .unwrap_or_else(|| vec![None; variations.len()]);

        Self {
            name,
            description: definition.description,
            section: definition.section,
            enabled,
            development,
            unlocked: definition.unlocked,
            feature_type,
            test_variations: variations,
            test_biases,
            labels,
            test_variation_assignment: assignment,
            test_variation_override: None,
        }
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the feature as under development
    pub fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    /// Replace the biases; ignored unless there is one per variation and they sum to 100.
    pub fn with_biases(mut self, biases: Vec<f64>) -> Self {
        self.test_biases = normalize_biases(Some(biases), self.test_variations.len());
        self
    }

    /// Attach a display label to one variation
    pub fn with_label(mut self, variation: impl Into<TestVariation>, label: impl Into<String>) -> Self {
        let variation = variation.into();
        if let Some(index) = self.test_variations.iter().position(|v| *v == variation) {
            if self.labels.len() < self.test_variations.len() {
                self.labels.resize(self.test_variations.len(), None);
            }
            self.labels[index] = Some(label.into());
        }
        self
    }

    /// Place the caller at a fixed point of the bias line
    pub fn with_assignment(mut self, assignment: f64) -> Self {
        self.test_variation_assignment = Percentage::new(assignment).value();
        self
    }

    /// Pin the caller to a variation regardless of biases.
    ///
    /// `Enabled` and `Disabled` also switch the feature on or off.
    pub fn with_variation(mut self, variation: impl Into<TestVariation>) -> Self {
        self.set_test_variation(variation.into());
        self
    }

    pub fn name(&self) -> &FeatureName {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    pub fn feature_type(&self) -> FeatureType {
        self.feature_type
    }

    pub fn is_development(&self) -> bool {
        self.development
    }

    pub fn test_variations(&self) -> &[TestVariation] {
        &self.test_variations
    }

    pub fn test_biases(&self) -> &[Percentage] {
        &self.test_biases
    }

    pub fn test_variation_assignment(&self) -> f64 {
        self.test_variation_assignment
    }

    /// Bias for a variation; zero when the feature is disabled.
    pub fn test_bias(&self, variation: &TestVariation) -> Option<Percentage> {
        if !self.enabled {
            return Some(Percentage::MIN);
        }
        self.test_variations
            .iter()
            .zip(&self.test_biases)
            .find(|(v, _)| *v == variation)
            .map(|(_, bias)| *bias)
    }

    /// Variation the caller is assigned to.
    ///
    /// An override wins; a disabled feature reports `Disabled`. Otherwise the
    /// biases are laid end to end over `[0, 100)` and the range holding the
    /// assignment decides. The final range is closed so an assignment of
    /// exactly 100 still lands somewhere.
    pub fn test_variation(&self) -> Option<TestVariation> {
        if let Some(ref variation) = self.test_variation_override {
            return Some(variation.clone());
        }
        if !self.enabled {
            return Some(TestVariation::disabled());
        }

        let last = self.test_variations.len().checked_sub(1)?;
        let mut lower = Percentage::MIN.value();
        for (index, (variation, bias)) in self
            .test_variations
            .iter()
            .zip(&self.test_biases)
            .enumerate()
        {
            let upper = lower + bias.value();
            if self.test_variation_assignment < upper || index == last {
                return Some(variation.clone());
            }
            lower = upper;
        }
        None
    }

    /// Whether [`test_variation`](Self::test_variation) is `variation`.
    ///
    /// Without an override a disabled feature only matches `Disabled`.
    pub fn is_test_variation(&self, variation: &TestVariation) -> bool {
        self.test_variation().as_ref() == Some(variation)
    }

    /// Whether the feature is active.
    ///
    /// On/off tests follow their assigned arm. Features still under
    /// development only report their `enabled` state in development mode.
    pub fn is_enabled(&self, development_mode: bool) -> bool {
        match self.feature_type {
            FeatureType::FeatureTest(TestKind::FeatureFlagAb) => self
                .test_variation()
                .map(|variation| variation.is_enabled())
                .unwrap_or(false),
            _ if self.development && !development_mode => false,
            _ => self.enabled,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.unwrap_or(false)
            && self.feature_type == FeatureType::UnlockFlag
            && self.is_enabled(false)
    }

    /// Label of `variation`; absent for disabled features.
    pub fn label(&self, variation: &TestVariation) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.test_variations
            .iter()
            .zip(&self.labels)
            .find(|(v, _)| *v == variation)
            .and_then(|(_, label)| label.as_deref())
    }

    /// First arm of a two-arm A/B test.
    pub fn is_group_a(&self) -> bool {
        self.ab_group(0)
    }

    /// Second arm of a two-arm A/B test.
    pub fn is_group_b(&self) -> bool {
        self.ab_group(1)
    }

    fn ab_group(&self, index: usize) -> bool {
        if self.feature_type != FeatureType::FeatureTest(TestKind::Ab)
            || self.test_variations.len() != 2
        {
            return false;
        }
        self.test_variation().as_ref() == self.test_variations.get(index)
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Any recorded unlock state makes the feature an unlock flag.
    pub(crate) fn set_unlocked(&mut self, unlocked: bool) {
        self.unlocked = Some(unlocked);
        self.feature_type = FeatureType::UnlockFlag;
    }

    pub(crate) fn set_development(&mut self, development: bool) {
        self.development = development;
    }

    pub(crate) fn unlocked(&self) -> Option<bool> {
        self.unlocked
    }

    /// Copy sticky state (assignment and unlock) from a previously stored copy.
    pub(crate) fn inherit_assignment(&mut self, stored: &Feature) {
        self.test_variation_assignment = stored.test_variation_assignment;
        self.unlocked = stored.unlocked;
    }

    pub(crate) fn set_test_variation(&mut self, variation: TestVariation) {
        if variation.is_enabled() {
            self.enabled = true;
        }
        if variation.is_disabled() {
            self.enabled = false;
        }
        self.test_variation_override = Some(variation);
    }
}

impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl From<&Feature> for FeatureDefinition {
    fn from(feature: &Feature) -> Self {
        Self {
            name: feature.name.as_str().to_string(),
            description: feature.description.clone(),
            section: feature.section.clone(),
            enabled: Some(feature.enabled),
            development: Some(feature.development),
            unlocked: feature.unlocked,
            // Deprecated features are dropped from documents on write
            feature_type: match feature.feature_type {
                FeatureType::Deprecated => None,
                other => Some(other),
            },
            test_variations: Some(
                feature
                    .test_variations
                    .iter()
                    .map(|v| v.as_str().to_string())
                    .collect(),
            ),
            test_biases: Some(feature.test_biases.iter().map(|b| b.value()).collect()),
            labels: Some(feature.labels.clone()),
            test_variation_assignment: Some(feature.test_variation_assignment),
        }
    }
}

impl Serialize for Feature {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        FeatureDefinition::from(self).serialize(serializer)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Feature: {}", self.name)?;
        writeln!(f, "Enabled: {}", self.is_enabled(false))?;
        if self.feature_type == FeatureType::UnlockFlag {
            writeln!(f, "Unlocked: {}", self.is_unlocked())?;
        }
        let variations = self
            .test_variations
            .iter()
            .zip(&self.test_biases)
            .map(|(variation, bias)| format!("{} ({})", variation, bias))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "Test variations: {}", variations)?;
        let assigned = self
            .test_variation()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unassigned".to_string());
        write!(
            f,
            "Test variation assignment: {:.0}% -> {}",
            self.test_variation_assignment, assigned
        )
    }
}

fn contains_all(variations: &[TestVariation], names: &[&str]) -> bool {
    names
        .iter()
        .all(|name| variations.iter().any(|variation| variation == name))
}

fn normalize_biases(biases: Option<Vec<f64>>, count: usize) -> Vec<Percentage> {
    if let Some(biases) = biases {
        let biases: Vec<Percentage> = biases.into_iter().map(Percentage::new).collect();
        let total = biases
            .iter()
            .fold(Percentage::MIN, |running, bias| running + *bias);
        if biases.len() == count && (total.value() - Percentage::MAX.value()).abs() < 1e-6 {
            return biases;
        }
    }
    if count == 0 {
        return Vec::new();
    }
    vec![Percentage::new(100.0 / count as f64); count]
}
