//! Merging a freshly loaded configuration with stored and local copies.

use crate::flag::Feature;

/// Combine a primary configuration with the stored copy and an optional local fallback.
///
/// - every primary feature keeps the assignment and unlock state of its stored copy
/// - stored features the primary no longer defines are kept
/// - a feature stays under development if the fallback says so
/// - fallback features nobody else defines are appended
pub fn merge_configurations(
    primary: Vec<Feature>,
    stored: Option<&[Feature]>,
    fallback: Option<&[Feature]>,
) -> Vec<Feature> {
    let mut merged: Vec<Feature> = primary
        .into_iter()
        .map(|mut feature| {
            if let Some(previous) = stored.and_then(|s| find(s, &feature)) {
                feature.inherit_assignment(previous);
            }
            feature
        })
        .collect();

    if let Some(stored) = stored {
        merged = append_missing(merged, stored);
    }

    if let Some(fallback) = fallback {
        for feature in merged.iter_mut() {
            if let Some(local) = find(fallback, feature)
                && local.is_development()
            {
                feature.set_development(true);
            }
        }
        merged = append_missing(merged, fallback);
    }

    merged
}

/// Append the features of `other` that `base` does not define.
pub fn append_missing(mut base: Vec<Feature>, other: &[Feature]) -> Vec<Feature> {
    let missing: Vec<Feature> = other
        .iter()
        .filter(|candidate| !base.iter().any(|existing| existing.name() == candidate.name()))
        .cloned()
        .collect();
    base.extend(missing);
    base
}

fn find<'a>(features: &'a [Feature], feature: &Feature) -> Option<&'a Feature> {
    features.iter().find(|candidate| candidate.name() == feature.name())
}
