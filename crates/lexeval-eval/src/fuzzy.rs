//! Fuzzy Matcher
//!
//! Greedy, type-partitioned matching of prediction texts to gold texts by
//! string similarity. Within a type, predictions are visited in order and
//! each takes the unused gold text with the highest ratio (first seen wins
//! ties). A pairing is accepted when the ratio reaches the threshold; the
//! assignment is not globally optimal.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use lexeval_core::EntityRecord;

use crate::metrics::MatchResult;
use crate::similarity::ratio;

/// Decision taken for one prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzyDecision {
    pub entity_type: String,
    pub prediction: String,
    /// Best unused gold candidate of the same type, if the type has any left
    pub best_gold: Option<String>,
    /// Similarity to `best_gold` (0 when there is no candidate)
    pub ratio: f64,
    pub matched: bool,
}

/// Full greedy alignment of a prediction set against a gold set
#[derive(Debug, Clone, Default, Serialize)]
pub struct FuzzyAlignment {
    /// One decision per distinct prediction, in prediction order
    pub decisions: Vec<FuzzyDecision>,
    /// Number of distinct gold `(text, type)` pairs
    pub gold_total: usize,
}

impl FuzzyAlignment {
    pub fn true_positives(&self) -> usize {
        self.decisions.iter().filter(|d| d.matched).count()
    }

    /// Collapse the alignment into counts and scores
    pub fn result(&self) -> MatchResult {
        let true_positives = self.true_positives();
        let false_positives = self.decisions.len() - true_positives;
        let false_negatives = self.gold_total - true_positives;
        MatchResult::from_counts(true_positives, false_positives, false_negatives)
    }

    /// Rejected predictions whose best candidate scored at least `floor`
    pub fn near_misses(&self, floor: f64) -> impl Iterator<Item = &FuzzyDecision> {
        self.decisions
            .iter()
            .filter(move |d| !d.matched && d.best_gold.is_some() && d.ratio >= floor)
    }
}

/// Distinct `(text, type)` keys in first-occurrence order
fn distinct_keys(records: &[EntityRecord]) -> Vec<(&str, &str)> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(EntityRecord::key)
        .filter(|key| seen.insert(*key))
        .collect()
}

/// Greedy similarity matcher with a fixed threshold
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    threshold: f64,
}

impl FuzzyMatcher {
    /// `threshold` is expected in (0, 1]; validate it at the boundary
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Align predictions to gold entries type by type
    pub fn align(&self, prediction: &[EntityRecord], gold: &[EntityRecord]) -> FuzzyAlignment {
        let predicted = distinct_keys(prediction);
        let gold = distinct_keys(gold);

        // Prediction types keep first-occurrence order
        let mut pred_types: Vec<&str> = Vec::new();
        let mut pred_by_type: HashMap<&str, Vec<&str>> = HashMap::new();
        for &(text, entity_type) in &predicted {
            pred_by_type
                .entry(entity_type)
                .or_insert_with(|| {
                    pred_types.push(entity_type);
                    Vec::new()
                })
                .push(text);
        }

        let mut gold_by_type: HashMap<&str, Vec<&str>> = HashMap::new();
        for &(text, entity_type) in &gold {
            gold_by_type.entry(entity_type).or_default().push(text);
        }

        let mut decisions = Vec::with_capacity(predicted.len());

        for entity_type in pred_types {
            let candidates = gold_by_type
                .get(entity_type)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let mut used = vec![false; candidates.len()];

            for text in &pred_by_type[entity_type] {
                let mut best: Option<(usize, f64)> = None;
                for (idx, candidate) in candidates.iter().enumerate() {
                    if used[idx] {
                        continue;
                    }
                    let r = ratio(text, candidate);
                    if best.map_or(true, |(_, best_ratio)| r > best_ratio) {
                        best = Some((idx, r));
                    }
                }

                let matched = matches!(best, Some((_, r)) if r >= self.threshold);
                if let (true, Some((idx, _))) = (matched, best) {
                    used[idx] = true;
                }

                decisions.push(FuzzyDecision {
                    entity_type: entity_type.to_string(),
                    prediction: text.to_string(),
                    best_gold: best.map(|(idx, _)| candidates[idx].to_string()),
                    ratio: best.map_or(0.0, |(_, r)| r),
                    matched,
                });
            }
        }

        FuzzyAlignment {
            decisions,
            gold_total: gold.len(),
        }
    }

    /// Score predictions against gold
    pub fn score(&self, prediction: &[EntityRecord], gold: &[EntityRecord]) -> MatchResult {
        self.align(prediction, gold).result()
    }
}

/// Score predictions by greedy same-type similarity matching
pub fn fuzzy_match(prediction: &[EntityRecord], gold: &[EntityRecord], threshold: f64) -> MatchResult {
    FuzzyMatcher::new(threshold).score(prediction, gold)
}

// ============================================================================
// Tests
// ============================================================================
