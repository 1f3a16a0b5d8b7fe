// Pennant - Feature flags and experiments for Rust
//
// This library answers feature-flag and experiment questions through a
// pluggable resolver, with static, remote and test-double resolvers.

// Re-export the feature crate
pub use pennant_features::*;

/// Prelude for common imports.
///
/// ```
/// use pennant::prelude::*;
///
/// let client = FlagClient::new(StaticResolver::builder().flag("dark_mode", true).build());
/// assert!(client.is_enabled("dark_mode"));
/// ```
pub mod prelude {
    pub use pennant_features::client;
    pub use pennant_features::{
        Feature, FlagClient, FlagError, RemoteResolver, Resolver, ResolverConfig, StaticResolver,
        TestDouble, TestVariation,
    };
}
