//! Client facade.
//!
//! [`FlagClient`] forwards the four feature questions to whichever
//! [`Resolver`] it was built with, so call sites never name the concrete
//! resolver. An optional process-wide default client backs the free
//! functions [`is_enabled`], [`test_variation`], [`variation_label`] and
//! [`user_is_in_test`].

use crate::flag::TestVariation;
use crate::resolver::Resolver;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Thin, cloneable handle over a shared resolver.
///
/// The client holds no state of its own: every answer comes straight from
/// the resolver, and failures surface as `false` or `None`.
///
/// # Examples
///
/// ```
/// use pennant_features::{FlagClient, StaticResolver};
///
/// let client = FlagClient::new(StaticResolver::builder().flag("dark_mode", true).build());
///
/// assert!(client.is_enabled("dark_mode"));
/// assert!(!client.is_enabled("unknown_feature"));
/// assert_eq!(client.test_variation("unknown_test"), None);
/// ```
#[derive(Clone)]
pub struct FlagClient {
    resolver: Arc<dyn Resolver>,
}

impl FlagClient {
    pub fn new(resolver: impl Resolver + 'static) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    /// Share an already reference-counted resolver
    pub fn from_arc(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    /// Whether the feature is active; `false` for unknown or empty names.
    pub fn is_enabled(&self, feature: &str) -> bool {
        let enabled = self.resolver.is_enabled(feature);
        debug!(feature, enabled, "is_enabled");
        enabled
    }

    /// Variation the caller is assigned to; `None` for unknown or unassigned tests.
    pub fn test_variation(&self, test: &str) -> Option<TestVariation> {
        let variation = self.resolver.test_variation(test);
        debug!(test, variation = variation.as_ref().map(TestVariation::as_str), "test_variation");
        variation
    }

    /// Label of the current variation; `None` when unassigned or unlabelled.
    pub fn variation_label(&self, test: &str) -> Option<String> {
        let label = self.resolver.variation_label(test);
        debug!(test, label = label.as_deref(), "variation_label");
        label
    }

    /// Whether the caller's current variation of `test` is `variation`.
    pub fn user_is_in_test(&self, test: &str, variation: &str) -> bool {
        let in_test = self.resolver.user_is_in_test(test, variation);
        debug!(test, variation, in_test, "user_is_in_test");
        in_test
    }
}

impl fmt::Debug for FlagClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagClient").finish_non_exhaustive()
    }
}

// ============================================================================
// Process-wide Default
// ============================================================================

static DEFAULT_CLIENT: RwLock<Option<FlagClient>> = RwLock::new(None);

/// Install the client used by the free functions, returning the previous one.
pub fn set_default(client: FlagClient) -> Option<FlagClient> {
    DEFAULT_CLIENT.write().replace(client)
}

/// Remove the default client; the free functions report `false`/`None` afterwards.
pub fn clear_default() -> Option<FlagClient> {
    DEFAULT_CLIENT.write().take()
}

pub fn default_client() -> Option<FlagClient> {
    DEFAULT_CLIENT.read().clone()
}

/// [`FlagClient::is_enabled`] on the default client.
pub fn is_enabled(feature: &str) -> bool {
    default_client().is_some_and(|client| client.is_enabled(feature))
}

/// [`FlagClient::test_variation`] on the default client.
pub fn test_variation(test: &str) -> Option<TestVariation> {
    default_client().and_then(|client| client.test_variation(test))
}

/// [`FlagClient::variation_label`] on the default client.
pub fn variation_label(test: &str) -> Option<String> {
    default_client().and_then(|client| client.variation_label(test))
}

/// [`FlagClient::user_is_in_test`] on the default client.
pub fn user_is_in_test(test: &str, variation: &str) -> bool {
    default_client().is_some_and(|client| client.user_is_in_test(test, variation))
}
