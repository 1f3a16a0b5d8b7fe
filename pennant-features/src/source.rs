//! Configuration sources.
//!
//! A source produces the raw bytes of the primary feature document. Sources
//! are only consulted on refresh, never on the query path.

use crate::error::{FlagError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Where the primary feature document comes from.
#[async_trait]
pub trait ConfigurationSource: Send + Sync {
    /// Fetch the raw document.
    async fn fetch(&self) -> Result<Vec<u8>>;

    /// Human-readable location used in logs and errors.
    fn describe(&self) -> String;
}

/// Document read from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigurationSource for FileSource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        debug!(path = %self.path.display(), "Reading feature document");
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| FlagError::fetch(self.describe(), e.to_string()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Document fetched with an HTTP GET.
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
}

#[cfg(feature = "remote")]
impl HttpSource {
    /// Create a source with its own client and the given request timeout.
    pub fn new(url: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(url, client))
    }

    /// Create a source sharing an existing client.
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(feature = "remote")]
#[async_trait]
impl ConfigurationSource for HttpSource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        debug!(url = %self.url, "Fetching feature document");
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FlagError::fetch(
                self.describe(),
                format!("unexpected status {}", status),
            ));
        }
        Ok(response.bytes().await?.to_vec())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Pick a source for a location: `http(s)://` URLs go over HTTP, anything else is a path.
#[cfg(feature = "remote")]
pub fn source_for(
    location: &str,
    timeout: std::time::Duration,
) -> Result<std::sync::Arc<dyn ConfigurationSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(std::sync::Arc::new(HttpSource::new(location, timeout)?))
    } else {
        Ok(std::sync::Arc::new(FileSource::new(location)))
    }
}

/// Pick a source for a location; without the `remote` feature only paths are supported.
#[cfg(not(feature = "remote"))]
pub fn source_for(
    location: &str,
    _timeout: std::time::Duration,
) -> Result<std::sync::Arc<dyn ConfigurationSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Err(FlagError::Config(format!(
            "{} requires the `remote` feature",
            location
        )));
    }
    Ok(std::sync::Arc::new(FileSource::new(location)))
}
