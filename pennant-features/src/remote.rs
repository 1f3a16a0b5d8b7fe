//! Resolver backed by a fetched feature document.
//!
//! [`RemoteResolver`] pulls a document from a [`ConfigurationSource`], layers
//! it over the persisted cache and local documents, and answers queries from
//! memory. Fetching happens only in [`RemoteResolver::refresh`]; queries never
//! wait on I/O and never fail.
//!
//! # Examples
//!
//! ```no_run
//! use pennant_features::{FlagClient, RemoteResolver, ResolverConfig};
//!
//! # async fn example() -> pennant_features::Result<()> {
//! let config = ResolverConfig::new()
//!     .with_configuration_url("https://cdn.example.com/features.json")
//!     .with_cache_dir("/var/cache/app");
//!
//! let resolver = RemoteResolver::from_config(&config)?;
//! resolver.refresh().await?;
//!
//! let client = FlagClient::new(resolver);
//! if client.is_enabled("dark_mode") {
//!     // ...
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::ResolverConfig;
use crate::error::{FlagError, Result};
use crate::flag::{Feature, TestVariation};
use crate::loader::{ConfigurationLoader, LoadOrigin};
use crate::resolver::{self, Resolver};
use crate::source::{self, ConfigurationSource};
use crate::store::FeatureStore;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Shortest period accepted by [`RemoteResolver::spawn_refresh`].
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Summary of a successful refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    /// Number of features now served
    pub features: usize,
    /// Layer the configuration came from
    pub origin: LoadOrigin,
    /// SHA-256 of the remote payload, hex encoded, when the remote document was used
    pub fingerprint: Option<String>,
    pub refreshed_at: DateTime<Utc>,
}

/// Resolver serving a periodically refreshed configuration.
#[derive(Clone)]
pub struct RemoteResolver {
    source: Option<Arc<dyn ConfigurationSource>>,
    loader: ConfigurationLoader,
    store: FeatureStore,
    development: bool,
    refresh_interval: Option<Duration>,
    last_refresh: Arc<RwLock<Option<RefreshOutcome>>>,
}

impl RemoteResolver {
    /// Resolver fetching from `source`; nothing is loaded until the first refresh.
    pub fn new(source: Arc<dyn ConfigurationSource>, loader: ConfigurationLoader) -> Self {
        Self::build(Some(source), loader)
    }

    /// Resolver without a primary source, serving cache and local documents only.
    pub fn local(loader: ConfigurationLoader) -> Self {
        Self::build(None, loader)
    }

    fn build(source: Option<Arc<dyn ConfigurationSource>>, loader: ConfigurationLoader) -> Self {
        Self {
            source,
            loader,
            store: FeatureStore::default(),
            development: false,
            refresh_interval: None,
            last_refresh: Arc::new(RwLock::new(None)),
        }
    }

    /// Build from configuration; validation errors are returned, nothing is fetched.
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        config.validate()?;
        let source = config
            .configuration_url
            .as_deref()
            .map(|location| source::source_for(location, config.timeout))
            .transpose()?;

        let mut resolver = Self::build(source, config.loader()).with_development(config.development);
        resolver.refresh_interval = config.refresh_interval;
        Ok(resolver)
    }

    pub fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    pub fn is_development(&self) -> bool {
        self.development
    }

    /// Interval requested by the configuration, if any
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval
    }

    /// Fetch the document and reload.
    ///
    /// A failed fetch is logged and the remaining layers are used. When no
    /// layer yields features the current configuration is kept and
    /// [`FlagError::NoConfiguration`] is returned.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let data = match &self.source {
            Some(source) => match source.fetch().await {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!(source = %source.describe(), error = %e, "Feature document fetch failed, using local layers");
                    None
                }
            },
            None => None,
        };
        // Cache and local documents are read with std::fs
        let resolver = self.clone();
        tokio::task::spawn_blocking(move || resolver.apply(data.as_deref())).await?
    }

    /// Reload using caller-supplied remote data instead of fetching.
    pub fn refresh_with_data(&self, data: &[u8]) -> Result<RefreshOutcome> {
        self.apply(Some(data))
    }

    fn apply(&self, data: Option<&[u8]>) -> Result<RefreshOutcome> {
        let Some(loaded) = self.loader.load(data) else {
            warn!(
                features = self.store.len(),
                "No feature configuration could be loaded, keeping the current one"
            );
            return Err(FlagError::NoConfiguration);
        };

        let fingerprint = match (loaded.origin, data) {
            (LoadOrigin::Remote, Some(data)) => Some(hex::encode(Sha256::digest(data))),
            _ => None,
        };
        let outcome = RefreshOutcome {
            features: loaded.features.len(),
            origin: loaded.origin,
            fingerprint,
            refreshed_at: Utc::now(),
        };

        self.store.replace(loaded.features);
        *self.last_refresh.write() = Some(outcome.clone());
        info!(
            features = outcome.features,
            origin = ?outcome.origin,
            fingerprint = outcome.fingerprint.as_deref(),
            "Feature configuration refreshed"
        );
        Ok(outcome)
    }

    /// Refresh every `interval` on the tokio runtime until the handle is aborted.
    ///
    /// Intervals shorter than [`MIN_REFRESH_INTERVAL`] are raised to it.
    pub fn spawn_refresh(&self, interval: Duration) -> JoinHandle<()> {
        if interval < MIN_REFRESH_INTERVAL {
            warn!(
                requested = ?interval,
                using = ?MIN_REFRESH_INTERVAL,
                "Refresh interval too short, using the minimum"
            );
        }
        let interval = interval.max(MIN_REFRESH_INTERVAL);
        let resolver = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = resolver.refresh().await {
                    warn!(error = %e, "Scheduled feature refresh failed");
                }
            }
        })
    }

    /// Outcome of the most recent successful refresh
    pub fn last_refresh(&self) -> Option<RefreshOutcome> {
        self.last_refresh.read().clone()
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        self.store.set_enabled(name, enabled)
    }

    pub fn set_test_variation(&self, name: &str, variation: impl Into<TestVariation>) -> bool {
        self.store.set_test_variation(name, variation.into())
    }

    /// Set the unlock state in memory and in the cache, so it survives reloads.
    pub fn set_unlocked(&self, name: &str, unlocked: bool) -> bool {
        if !self.store.set_unlocked(name, unlocked) {
            return false;
        }
        if let (Some(cache), Some(feature)) = (self.loader.cache(), self.store.feature(name))
            && let Err(e) = cache.set_unlocked(&feature, unlocked)
        {
            warn!(feature = name, error = %e, "Failed to persist unlock state");
        }
        true
    }

    /// Remove a feature from memory and from the cache.
    pub fn remove_feature(&self, name: &str) -> bool {
        if let Some(cache) = self.loader.cache()
            && let Err(e) = cache.remove_feature(name)
        {
            warn!(feature = name, error = %e, "Failed to remove feature from cache");
        }
        self.store.remove(name)
    }

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

    pub fn log_summary(&self) {
        resolver::log_features(&self.store, self.development);
    }
}

impl fmt::Debug for RemoteResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteResolver")
            .field("source", &self.source.as_ref().map(|source| source.describe()))
            .field("loader", &self.loader)
            .field("features", &self.store.len())
            .field("development", &self.development)
            .finish()
    }
}

impl Resolver for RemoteResolver {
    fn is_enabled(&self, feature: &str) -> bool {
        resolver::store_is_enabled(&self.store, feature, self.development)
    }

    fn test_variation(&self, test: &str) -> Option<TestVariation> {
        resolver::store_test_variation(&self.store, test)
    }

    fn variation_label(&self, test: &str) -> Option<String> {
        resolver::store_variation_label(&self.store, test)
    }

    fn user_is_in_test(&self, test: &str, variation: &str) -> bool {
        resolver::store_user_is_in_test(&self.store, test, variation)
    }
}
