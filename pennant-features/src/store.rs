//! In-memory feature store shared by the resolvers.

use crate::flag::{Feature, FeatureName, FeatureType, TestKind, TestVariation};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Thread-safe list of resolved features.
///
/// Cloning shares the underlying list. Reads never block on I/O; writers
/// swap or patch the list under a short write lock.
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    features: Arc<RwLock<Vec<Feature>>>,
}

impl FeatureStore {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            features: Arc::new(RwLock::new(features)),
        }
    }

    /// Replace the whole configuration
    pub fn replace(&self, features: Vec<Feature>) {
        *self.features.write() = features;
    }

    /// Copy of the current configuration
    pub fn snapshot(&self) -> Vec<Feature> {
        self.features.read().clone()
    }

    pub fn len(&self) -> usize {
        self.features.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.read().is_empty()
    }

    pub fn names(&self) -> Vec<FeatureName> {
        self.features.read().iter().map(|f| f.name().clone()).collect()
    }

    /// Copy of a single feature
    pub fn feature(&self, name: &str) -> Option<Feature> {
        self.with_feature(name, Feature::clone)
    }

    /// Run `f` against a feature under the read lock.
    pub fn with_feature<T>(&self, name: &str, f: impl FnOnce(&Feature) -> T) -> Option<T> {
        if name.is_empty() {
            return None;
        }
        let features = self.features.read();
        features.iter().find(|feature| feature.name() == name).map(f)
    }

    fn update(&self, name: &str, f: impl FnOnce(&mut Feature)) -> bool {
        let mut features = self.features.write();
        match features.iter_mut().find(|feature| feature.name() == name) {
            Some(feature) => {
                f(feature);
                true
            }
            None => {
                debug!(feature = name, "Ignoring update for unknown feature");
                false
            }
        }
    }

    /// Switch a feature on or off until the next reload.
    ///
    /// Plain flags and on/off tests move to their other arm, so the
    /// reported variation stays consistent with the enabled state.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        self.update(name, |feature| {
            let flips_arm = matches!(
                feature.feature_type(),
                FeatureType::FeatureFlag | FeatureType::FeatureTest(TestKind::FeatureFlagAb)
            );
            let target = if enabled {
                TestVariation::enabled()
            } else {
                TestVariation::disabled()
            };
            if flips_arm && feature.test_variations().contains(&target) {
                feature.set_test_variation(target);
            } else {
                feature.set_enabled(enabled);
            }
        })
    }

    /// Pin the caller to `variation` until the next reload.
    pub fn set_test_variation(&self, name: &str, variation: TestVariation) -> bool {
        self.update(name, |feature| feature.set_test_variation(variation))
    }

    pub fn set_unlocked(&self, name: &str, unlocked: bool) -> bool {
        self.update(name, |feature| feature.set_unlocked(unlocked))
    }

    /// Drop a feature from memory; it comes back if the next load still defines it.
    pub fn remove(&self, name: &str) -> bool {
        let mut features = self.features.write();
        let before = features.len();
        features.retain(|feature| feature.name() != name);
        features.len() != before
    }
}
