//! Error types for loading and refreshing feature configuration.
//!
//! None of these ever reach the query surface: `is_enabled`, `test_variation`,
//! `variation_label` and `user_is_in_test` map every failure to their
//! disabled/unassigned default.

use thiserror::Error;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, FlagError>;

/// Feature configuration errors.
#[derive(Debug, Error)]
pub enum FlagError {
    /// Document could not be parsed
    #[error("Failed to parse feature configuration: {0}")]
    Parse(String),

    /// A feature definition is structurally invalid
    #[error("Invalid feature definition: {0}")]
    InvalidDefinition(String),

    /// Configuration source could not be fetched
    #[error("Failed to fetch feature configuration from {source_name}: {message}")]
    Fetch {
        /// Source description (URL or path)
        source_name: String,
        /// Failure description
        message: String,
    },

    /// Underlying HTTP client error
    #[cfg(feature = "remote")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resolver configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Neither the remote document, the cache nor any local document produced features
    #[error("No feature configuration could be loaded")]
    NoConfiguration,

    /// Document format could not be determined
    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking reload task panicked or was cancelled
    #[error("Refresh task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl FlagError {
    /// Create a fetch error for the given source.
    pub fn fetch(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
