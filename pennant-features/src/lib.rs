//! Feature Flags and Experiments for Pennant
//!
//! Answers four questions for application code: is a feature enabled, which
//! variation of a test is the caller in, what is that variation's label, and
//! is the caller in a given variation. Answers come from a pluggable
//! [`Resolver`] behind the [`FlagClient`] facade.
//!
//! # Features
//!
//! - 🚀 **Feature Flags** - On/off flags with development-only gating
//! - 📊 **A/B and MVT Tests** - Biased variation assignment with labels
//! - 📌 **Sticky Assignment** - Persisted cache or subject-key bucketing
//! - 🌐 **Remote Documents** - JSON/TOML over HTTP with local fallbacks
//! - 🧪 **Test Double** - Programmable resolver with a call log
//!
//! # Quick Start
//!
//! ```
//! use pennant_features::*;
//!
//! let resolver = StaticResolver::builder()
//!     .flag("dark_mode", true)
//!     .test("checkout_flow", ["A", "B"])
//!     .labels("checkout_flow", [("A", "Classic"), ("B", "Streamlined")])
//!     .assign("checkout_flow", "B")
//!     .build();
//!
//! let client = FlagClient::new(resolver);
//!
//! assert!(client.is_enabled("dark_mode"));
//! assert!(!client.is_enabled("unknown_feature"));
//! assert_eq!(client.test_variation("checkout_flow"), Some(TestVariation::new("B")));
//! assert_eq!(client.variation_label("checkout_flow").as_deref(), Some("Streamlined"));
//! assert!(client.user_is_in_test("checkout_flow", "b"));
//! ```
//!
//! # Feature Documents
//!
//! ```
//! use pennant_features::*;
//!
//! let resolver = StaticResolver::from_json(r#"{"features": [
//!     {"name": "dark_mode", "enabled": true},
//!     {"name": "onboarding", "test-variations": ["Short", "Long"], "test-biases": [20, 80]},
//!     {"name": "new_editor", "enabled": true, "development": true}
//! ]}"#)?;
//!
//! assert!(resolver.is_enabled("dark_mode"));
//! assert!(!resolver.is_enabled("new_editor"));
//! # Ok::<(), FlagError>(())
//! ```
//!
//! # Remote Configuration
//!
//! ```no_run
//! use pennant_features::*;
//!
//! # async fn example() -> Result<()> {
//! let config = ResolverConfig::from_env()?;
//! let resolver = RemoteResolver::from_config(&config)?;
//! resolver.refresh().await?;
//!
//! if let Some(interval) = resolver.refresh_interval() {
//!     resolver.spawn_refresh(interval);
//! }
//!
//! client::set_default(FlagClient::new(resolver));
//! if is_enabled("dark_mode") {
//!     // ...
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod flag;
pub mod loader;
pub mod merge;
pub mod parse;
pub mod remote;
pub mod resolver;
pub mod source;
pub mod store;
pub mod testing;

pub use cache::ConfigurationCache;
pub use client::{FlagClient, is_enabled, test_variation, user_is_in_test, variation_label};
pub use config::ResolverConfig;
pub use error::{FlagError, Result};
pub use flag::{
    AssignmentStrategy, Feature, FeatureDefinition, FeatureName, FeatureType, Percentage,
    TestKind, TestVariation,
};
pub use loader::{ConfigurationLoader, LoadOrigin, LoadedConfiguration};
pub use parse::ConfigurationFormat;
pub use remote::{MIN_REFRESH_INTERVAL, RefreshOutcome, RemoteResolver};
pub use resolver::{Resolver, StaticResolver, StaticResolverBuilder};
#[cfg(feature = "remote")]
pub use source::HttpSource;
pub use source::{ConfigurationSource, FileSource};
pub use store::FeatureStore;
pub use testing::{ResolverCall, TestDouble};
