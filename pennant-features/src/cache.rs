//! Persisted configuration cache.
//!
//! The cache keeps the last merged configuration on disk, including each
//! caller's test assignment, so assignments stay sticky across restarts.

use crate::error::Result;
use crate::flag::{AssignmentStrategy, Feature};
use crate::parse::{self, ConfigurationFormat};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the cache inside its directory.
pub const CACHE_FILE_NAME: &str = "features.json";

/// JSON file holding the last known configuration.
#[derive(Debug, Clone)]
pub struct ConfigurationCache {
    path: PathBuf,
}

impl ConfigurationCache {
    /// Cache stored as `features.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CACHE_FILE_NAME),
        }
    }

    /// Cache stored at an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the cached configuration; unreadable caches count as absent.
    pub fn load(&self) -> Option<Vec<Feature>> {
        let data = fs::read(&self.path).ok()?;
        // Cached entries always carry an assignment, the strategy is never consulted
        match parse::parse_features(&data, ConfigurationFormat::Json, &AssignmentStrategy::Random) {
            Ok(features) => Some(features),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable feature cache");
                None
            }
        }
    }

    /// Write the configuration, creating the directory when needed.
    pub fn store(&self, features: &[Feature]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let data = parse::to_json(features)?;
        fs::write(&self.path, data)?;
        debug!(path = %self.path.display(), features = features.len(), "Feature cache written");
        Ok(())
    }

    /// Delete the cache file if present.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a feature from the cache only; the in-memory copy is untouched.
    pub fn remove_feature(&self, name: &str) -> Result<()> {
        if let Some(mut features) = self.load() {
            features.retain(|feature| feature.name() != name);
            self.store(&features)?;
        }
        Ok(())
    }

    /// Persist an unlock state; the feature is added to the cache if it is not cached yet.
    pub fn set_unlocked(&self, feature: &Feature, unlocked: bool) -> Result<()> {
        let mut features = self.load().unwrap_or_default();
        match features.iter_mut().find(|cached| cached.name() == feature.name()) {
            Some(cached) => cached.set_unlocked(unlocked),
            None => {
                let mut added = feature.clone();
                added.set_unlocked(unlocked);
                features.push(added);
            }
        }
        self.store(&features)
    }
}
