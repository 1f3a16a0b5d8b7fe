//! Layered configuration loading.
//!
//! Sources in order of preference: the primary (usually remote) document,
//! the persisted cache, a local fallback document, and a bundled default.

use crate::cache::ConfigurationCache;
use crate::flag::{AssignmentStrategy, Feature};
use crate::merge::merge_configurations;
use crate::parse::{self, ConfigurationFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which layer produced a loaded configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    Remote,
    Cache,
    LocalFallback,
    Bundled,
}

/// Result of a successful load.
#[derive(Debug, Clone)]
pub struct LoadedConfiguration {
    pub features: Vec<Feature>,
    pub origin: LoadOrigin,
}

/// Combines the primary document with cache and local documents.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationLoader {
    format: ConfigurationFormat,
    strategy: AssignmentStrategy,
    cache: Option<ConfigurationCache>,
    fallback: Option<PathBuf>,
    bundled: Option<PathBuf>,
}

impl ConfigurationLoader {
    pub fn new(format: ConfigurationFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Set the assignment strategy for features without a stored assignment
    pub fn with_strategy(mut self, strategy: AssignmentStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Persist merged configurations in this cache
    pub fn with_cache(mut self, cache: ConfigurationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Local document merged over the primary one
    pub fn with_fallback(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback = Some(path.into());
        self
    }

    /// Default document shipped with the application
    pub fn with_bundled(mut self, path: impl Into<PathBuf>) -> Self {
        self.bundled = Some(path.into());
        self
    }

    pub fn format(&self) -> ConfigurationFormat {
        self.format
    }

    pub fn strategy(&self) -> &AssignmentStrategy {
        &self.strategy
    }

    pub fn cache(&self) -> Option<&ConfigurationCache> {
        self.cache.as_ref()
    }

    /// Produce a configuration from optional primary bytes.
    ///
    /// Returns `None` only when no layer yields features.
    pub fn load(&self, primary: Option<&[u8]>) -> Option<LoadedConfiguration> {
        let cached = self.cache.as_ref().and_then(ConfigurationCache::load);

        if let Some(remote) = primary.and_then(|data| self.parse_primary(data)) {
            let fallback = self.fallback.as_deref().and_then(|p| self.read_local(p));
            let features = merge_configurations(remote, cached.as_deref(), fallback.as_deref());
            self.write_cache(&features);
            return Some(LoadedConfiguration {
                features,
                origin: LoadOrigin::Remote,
            });
        }

        if let Some(stored) = cached {
            let fallback = self
                .fallback
                .as_deref()
                .and_then(|p| self.read_local(p))
                .or_else(|| self.bundled.as_deref().and_then(|p| self.read_local(p)));
            let features = merge_configurations(stored.clone(), Some(stored.as_slice()), fallback.as_deref());
            return Some(LoadedConfiguration {
                features,
                origin: LoadOrigin::Cache,
            });
        }

        let local = [
            (self.fallback.as_deref(), LoadOrigin::LocalFallback),
            (self.bundled.as_deref(), LoadOrigin::Bundled),
        ];
        for (path, origin) in local {
            if let Some(features) = path.and_then(|p| self.read_local(p)) {
                if !self.cache.as_ref().is_some_and(ConfigurationCache::exists) {
                    self.write_cache(&features);
                }
                return Some(LoadedConfiguration { features, origin });
            }
        }

        debug!("No feature configuration layer produced features");
        None
    }

    fn parse_primary(&self, data: &[u8]) -> Option<Vec<Feature>> {
        match parse::parse_features(data, self.format, &self.strategy) {
            Ok(features) => Some(features),
            Err(e) => {
                warn!(error = %e, "Ignoring unparseable primary feature document");
                None
            }
        }
    }

    fn read_local(&self, path: &Path) -> Option<Vec<Feature>> {
        let format = path
            .to_str()
            .and_then(ConfigurationFormat::detect)
            .unwrap_or(self.format);
        let data = std::fs::read(path).ok()?;
        match parse::parse_features(&data, format, &self.strategy) {
            Ok(features) => Some(features),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unparseable local feature document");
                None
            }
        }
    }

    fn write_cache(&self, features: &[Feature]) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.store(features)
        {
            warn!(path = %cache.path().display(), error = %e, "Failed to write feature cache");
        }
    }
}
