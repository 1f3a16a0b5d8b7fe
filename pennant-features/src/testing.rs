// Programmable resolver for tests

use crate::flag::TestVariation;
use crate::resolver::Resolver;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A query received by a [`TestDouble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverCall {
    IsEnabled(String),
    TestVariation(String),
    VariationLabel(String),
    UserIsInTest(String, String),
}

impl ResolverCall {
    /// Name of the resolver method
    pub fn method(&self) -> &'static str {
        match self {
            Self::IsEnabled(_) => "is_enabled",
            Self::TestVariation(_) => "test_variation",
            Self::VariationLabel(_) => "variation_label",
            Self::UserIsInTest(_, _) => "user_is_in_test",
        }
    }
}

#[derive(Debug, Clone)]
struct Assignment {
    variation: TestVariation,
    label: Option<String>,
}

/// Resolver with hand-set answers that records every query.
///
/// Clones share state, so a test can keep a handle after passing the double
/// to a [`FlagClient`](crate::FlagClient).
///
/// ```
/// use pennant_features::{FlagClient, TestDouble};
///
/// let double = TestDouble::new()
///     .with_flag("dark_mode", true)
///     .with_assignment("checkout_flow", "B")
///     .with_label("checkout_flow", "Streamlined");
/// let client = FlagClient::new(double.clone());
///
/// assert!(client.is_enabled("dark_mode"));
/// assert!(double.was_called("is_enabled"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TestDouble {
    flags: Arc<Mutex<HashMap<String, bool>>>,
    assignments: Arc<Mutex<HashMap<String, Assignment>>>,
    calls: Arc<Mutex<Vec<ResolverCall>>>,
}

impl TestDouble {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(self, name: impl Into<String>, enabled: bool) -> Self {
        self.set_flag(name, enabled);
        self
    }

    pub fn with_assignment(self, test: impl Into<String>, variation: impl Into<TestVariation>) -> Self {
        self.set_assignment(test, variation);
        self
    }

    /// Label the current assignment of `test`
    pub fn with_label(self, test: &str, label: impl Into<String>) -> Self {
        self.set_label(test, label);
        self
    }

    pub fn set_flag(&self, name: impl Into<String>, enabled: bool) {
        self.flags.lock().insert(name.into(), enabled);
    }

    /// Assign a variation; any previous label is dropped
    pub fn set_assignment(&self, test: impl Into<String>, variation: impl Into<TestVariation>) {
        self.assignments.lock().insert(
            test.into(),
            Assignment {
                variation: variation.into(),
                label: None,
            },
        );
    }

    /// Label the current assignment; ignored when `test` has none
    pub fn set_label(&self, test: &str, label: impl Into<String>) {
        if let Some(assignment) = self.assignments.lock().get_mut(test) {
            assignment.label = Some(label.into());
        }
    }

    pub fn clear_assignment(&self, test: &str) {
        self.assignments.lock().remove(test);
    }

    fn record(&self, call: ResolverCall) {
        self.calls.lock().push(call);
    }

    /// All recorded queries in order
    pub fn calls(&self) -> Vec<ResolverCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of recorded calls to one method
    pub fn method_call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method() == method)
            .count()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.method_call_count(method) > 0
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

impl Resolver for TestDouble {
    fn is_enabled(&self, feature: &str) -> bool {
        self.record(ResolverCall::IsEnabled(feature.to_string()));
        self.flags.lock().get(feature).copied().unwrap_or(false)
    }

    fn test_variation(&self, test: &str) -> Option<TestVariation> {
        self.record(ResolverCall::TestVariation(test.to_string()));
        self.assignments
            .lock()
            .get(test)
            .map(|assignment| assignment.variation.clone())
    }

    fn variation_label(&self, test: &str) -> Option<String> {
        self.record(ResolverCall::VariationLabel(test.to_string()));
        self.assignments
            .lock()
            .get(test)
            .and_then(|assignment| assignment.label.clone())
    }

    fn user_is_in_test(&self, test: &str, variation: &str) -> bool {
        self.record(ResolverCall::UserIsInTest(
            test.to_string(),
            variation.to_string(),
        ));
        self.assignments
            .lock()
            .get(test)
            .is_some_and(|assignment| assignment.variation == variation)
    }
}
