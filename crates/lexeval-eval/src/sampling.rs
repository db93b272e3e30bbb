//! Error Sampler
//!
//! Bounded samples of exact-match errors for manual triage. No fuzzy
//! tolerance is applied here.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use lexeval_core::EntityRecord;

use crate::metrics::key_set;

/// False positives and false negatives, each capped at `k`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSamples {
    pub false_positives: Vec<EntityRecord>,
    pub false_negatives: Vec<EntityRecord>,
}

/// Sorted `left - right`, truncated to `k`
fn sorted_difference(
    left: &HashSet<(&str, &str)>,
    right: &HashSet<(&str, &str)>,
    k: usize,
) -> Vec<EntityRecord> {
    let mut diff: Vec<(&str, &str)> = left.difference(right).copied().collect();
    diff.sort_unstable();
    diff.into_iter()
        .take(k)
        .map(|(text, entity_type)| EntityRecord::new(text, entity_type))
        .collect()
}

/// Sample up to `k` false positives and `k` false negatives
///
/// Samples come out in `(text, type)` order so repeated runs agree.
pub fn sample_errors(prediction: &[EntityRecord], gold: &[EntityRecord], k: usize) -> ErrorSamples {
    let predicted = key_set(prediction);
    let gold = key_set(gold);

    ErrorSamples {
        false_positives: sorted_difference(&predicted, &gold, k),
        false_negatives: sorted_difference(&gold, &predicted, k),
    }
}
