//! Quality Metrics module
//!
//! Precision, recall and F1 for entity extraction, and the exact
//! (set-equality) matcher.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use lexeval_core::EntityRecord;

// ============================================================================
// Match Result
// ============================================================================

/// Outcome of matching a prediction set against a gold set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Predictions that matched a gold entity
    pub true_positives: usize,
    /// Predictions without a gold counterpart
    pub false_positives: usize,
    /// Gold entities that were not predicted
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl MatchResult {
    /// Derive precision, recall and F1 from counts; zero denominators give 0
    pub fn from_counts(true_positives: usize, false_positives: usize, false_negatives: usize) -> Self {
        let precision = ratio_or_zero(true_positives, true_positives + false_positives);
        let recall = ratio_or_zero(true_positives, true_positives + false_negatives);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Self {
            true_positives,
            false_positives,
            false_negatives,
            precision,
            recall,
            f1,
        }
    }

    /// Number of predictions scored
    pub fn predicted_total(&self) -> usize {
        self.true_positives + self.false_positives
    }

    /// Number of gold entities scored
    pub fn gold_total(&self) -> usize {
        self.true_positives + self.false_negatives
    }

    /// One-line summary, e.g. `TP=3 FP=1 FN=0 | P=0.750 R=1.000 F1=0.857`
    pub fn summary(&self, decimals: usize) -> String {
        format!(
            "TP={} FP={} FN={} | P={:.prec$} R={:.prec$} F1={:.prec$}",
            self.true_positives,
            self.false_positives,
            self.false_negatives,
            self.precision,
            self.recall,
            self.f1,
            prec = decimals
        )
    }
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary(3))
    }
}

fn ratio_or_zero(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

// ============================================================================
// Exact Matcher
// ============================================================================

/// Collapse records into a set of borrowed `(text, type)` keys
pub(crate) fn key_set(records: &[EntityRecord]) -> HashSet<(&str, &str)> {
    records.iter().map(EntityRecord::key).collect()
}

/// Score predictions by set equality on `(text, type)`
///
/// Values are compared literally; normalize both sides first to compare
/// canonical keys. Ordering and duplicates do not affect the result.
pub fn exact_match(prediction: &[EntityRecord], gold: &[EntityRecord]) -> MatchResult {
    let predicted = key_set(prediction);
    let gold = key_set(gold);

    let true_positives = predicted.intersection(&gold).count();
    let false_positives = predicted.len() - true_positives;
    let false_negatives = gold.len() - true_positives;

    MatchResult::from_counts(true_positives, false_positives, false_negatives)
}

// ============================================================================
// Tests
// ============================================================================
