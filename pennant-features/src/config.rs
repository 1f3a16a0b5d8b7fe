// Resolver configuration

use crate::cache::ConfigurationCache;
use crate::error::{FlagError, Result};
use crate::flag::AssignmentStrategy;
use crate::loader::ConfigurationLoader;
use crate::parse::ConfigurationFormat;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of every environment variable read by [`ResolverConfig::from_env`].
pub const ENV_PREFIX: &str = "PENNANT";

/// Default HTTP timeout for fetching the feature document.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for a [`RemoteResolver`](crate::RemoteResolver).
///
/// | variable | setting |
/// |---|---|
/// | `PENNANT_CONFIGURATION_URL` | document URL or path |
/// | `PENNANT_FALLBACK_PATH` | local document merged over the remote one |
/// | `PENNANT_BUNDLED_PATH` | document used when nothing else loads |
/// | `PENNANT_CACHE_DIR` | directory of the persisted cache |
/// | `PENNANT_FORMAT` | `json` or `toml` |
/// | `PENNANT_DEVELOPMENT` | enable features still under development |
/// | `PENNANT_SUBJECT` | subject key for sticky bucketing |
/// | `PENNANT_REFRESH_SECS` | background refresh interval |
/// | `PENNANT_TIMEOUT_SECS` | HTTP timeout |
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    pub configuration_url: Option<String>,
    pub fallback_path: Option<PathBuf>,
    pub bundled_path: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub format: Option<ConfigurationFormat>,
    pub development: bool,
    pub subject: Option<String>,
    pub refresh_interval: Option<Duration>,
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            configuration_url: None,
            fallback_path: None,
            bundled_path: None,
            cache_dir: None,
            format: None,
            development: false,
            subject: None,
            refresh_interval: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `PENNANT_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Read a `.env` file, then the process environment on top of it.
    ///
    /// The file is parsed without touching the process environment.
    pub fn from_dotenv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let entries = dotenvy::from_path_iter(path)
            .map_err(|e| FlagError::Config(format!("{}: {}", path.display(), e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FlagError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_vars(entries.into_iter().chain(std::env::vars()))
    }

    /// Build from `(name, value)` pairs; names without the `PENNANT_` prefix are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let prefix = format!("{}_", ENV_PREFIX);
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(key, value)| {
                key.as_ref()
                    .strip_prefix(&prefix)
                    .map(|name| (name.to_lowercase(), value.into()))
            })
            .collect();

        let get = |key: &str| lookup(&vars, key);

        Ok(Self {
            configuration_url: get("configuration_url").map(str::to_string),
            fallback_path: get("fallback_path").map(PathBuf::from),
            bundled_path: get("bundled_path").map(PathBuf::from),
            cache_dir: get("cache_dir").map(PathBuf::from),
            format: get("format").map(str::parse::<ConfigurationFormat>).transpose()?,
            development: get("development")
                .map(|value| parse_bool("DEVELOPMENT", value))
                .transpose()?
                .unwrap_or(false),
            subject: get("subject").map(str::to_string),
            refresh_interval: get("refresh_secs")
                .map(|value| parse_secs("REFRESH_SECS", value))
                .transpose()?,
            timeout: get("timeout_secs")
                .map(|value| parse_secs("TIMEOUT_SECS", value))
                .transpose()?
                .unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    pub fn with_configuration_url(mut self, url: impl Into<String>) -> Self {
        self.configuration_url = Some(url.into());
        self
    }

    pub fn with_fallback_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_path = Some(path.into());
        self
    }

    pub fn with_bundled_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.bundled_path = Some(path.into());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_format(mut self, format: ConfigurationFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the settings can produce a resolver.
    pub fn validate(&self) -> Result<()> {
        if self.configuration_url.is_none()
            && self.fallback_path.is_none()
            && self.bundled_path.is_none()
            && self.cache_dir.is_none()
        {
            return Err(FlagError::Config(
                "no configuration URL, cache directory or local document configured".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(FlagError::Config("timeout must be greater than zero".to_string()));
        }
        if self.refresh_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(FlagError::Config(
                "refresh interval must be greater than zero".to_string(),
            ));
        }
        if let Some(subject) = &self.subject
            && subject.trim().is_empty()
        {
            return Err(FlagError::Config("subject must not be empty".to_string()));
        }
        Ok(())
    }

    /// Explicit format, else detected from the configuration URL, else JSON.
    pub fn format(&self) -> ConfigurationFormat {
        self.format
            .or_else(|| {
                self.configuration_url
                    .as_deref()
                    .and_then(ConfigurationFormat::detect)
            })
            .unwrap_or_default()
    }

    pub fn strategy(&self) -> AssignmentStrategy {
        match &self.subject {
            Some(subject) => AssignmentStrategy::Subject(subject.clone()),
            None => AssignmentStrategy::Random,
        }
    }

    /// Loader wired with the cache and local documents.
    pub fn loader(&self) -> ConfigurationLoader {
        let mut loader = ConfigurationLoader::new(self.format()).with_strategy(self.strategy());
        if let Some(dir) = &self.cache_dir {
            loader = loader.with_cache(ConfigurationCache::in_dir(dir));
        }
        if let Some(path) = &self.fallback_path {
            loader = loader.with_fallback(path);
        }
        if let Some(path) = &self.bundled_path {
            loader = loader.with_bundled(path);
        }
        loader
    }
}

fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(FlagError::Config(format!(
            "{}_{} must be a boolean, got `{}`",
            ENV_PREFIX, key, value
        ))),
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    value.parse::<u64>().map(Duration::from_secs).map_err(|_| {
        FlagError::Config(format!(
            "{}_{} must be a whole number of seconds, got `{}`",
            ENV_PREFIX, key, value
        ))
    })
}
