//! LexEval Eval - Entity extraction evaluation engine
//!
//! Scores machine-extracted `(entity, type)` records against a gold standard.
//! Both sides are canonicalized (text normalization plus taxonomy mapping),
//! then compared by exact set equality and by greedy per-type fuzzy matching.
//! Per-type breakdowns and bounded error samples support manual triage.
//!
//! The engine is synchronous and never fails on bad input: malformed
//! payloads degrade to empty sets with a logged diagnostic.

use serde::Serialize;
use tracing::debug;

use lexeval_core::{EntityRecord, EvaluationConfig};

pub mod fuzzy;
pub mod loader;
pub mod metrics;
pub mod normalize;
pub mod report;
pub mod sampling;
pub mod similarity;
pub mod type_map;

pub use fuzzy::{fuzzy_match, FuzzyAlignment, FuzzyDecision, FuzzyMatcher};
pub use loader::{load_entities, load_entities_from_str};
pub use metrics::{exact_match, MatchResult};
pub use normalize::{canonical_record, canonical_records, normalize};
pub use report::{per_type_report, render_comparison, EvaluationReport, TypeReport};
pub use sampling::{sample_errors, ErrorSamples};
pub use similarity::ratio;
pub use type_map::{normalize_type, TypeMap};

// ============================================================================
// Evaluator
// ============================================================================

/// Evaluation pipeline for prediction sets against one gold set
#[derive(Debug, Clone)]
pub struct Evaluator {
    type_map: TypeMap,
    matcher: FuzzyMatcher,
    /// Error samples kept per side
    samples: usize,
    /// Compare canonical keys (true) or raw strings (false)
    normalize: bool,
}

impl Evaluator {
    /// Create an evaluator with the given fuzzy threshold
    pub fn new(type_map: TypeMap, threshold: f64) -> Self {
        Self {
            type_map,
            matcher: FuzzyMatcher::new(threshold),
            samples: 10,
            normalize: true,
        }
    }

    /// Build from the `[evaluation]` configuration section
    pub fn from_config(config: &EvaluationConfig, type_map: TypeMap) -> Self {
        Self::new(type_map, config.fuzzy_threshold)
            .with_samples(config.error_samples)
            .with_normalization(config.normalize)
    }

    /// Number of false positives and false negatives to sample
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Enable/disable canonicalization before matching
    pub fn with_normalization(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.matcher.threshold()
    }

    /// Records as they will be compared
    pub fn prepare(&self, records: &[EntityRecord]) -> Vec<EntityRecord> {
        if self.normalize {
            canonical_records(records, &self.type_map)
        } else {
            records.to_vec()
        }
    }

    /// Run every scorer over one prediction set
    pub fn evaluate(
        &self,
        name: &str,
        prediction: &[EntityRecord],
        gold: &[EntityRecord],
    ) -> EvaluationReport {
        let prediction = self.prepare(prediction);
        let gold = self.prepare(gold);

        let exact = exact_match(&prediction, &gold);
        let fuzzy = self.matcher.score(&prediction, &gold);

        debug!(
            name,
            exact_f1 = exact.f1,
            fuzzy_f1 = fuzzy.f1,
            "prediction set scored"
        );

        EvaluationReport {
            name: name.to_string(),
            predicted_entities: prediction.len(),
            exact,
            fuzzy,
            fuzzy_threshold: self.threshold(),
            per_type: per_type_report(&prediction, &gold),
            errors: sample_errors(&prediction, &gold, self.samples),
        }
    }

    /// Fuzzy decisions for one prediction set, for near-miss inspection
    pub fn align(&self, prediction: &[EntityRecord], gold: &[EntityRecord]) -> FuzzyAlignment {
        self.matcher
            .align(&self.prepare(prediction), &self.prepare(gold))
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::from_config(&EvaluationConfig::default(), TypeMap::acordao_default())
    }
}

/// Serializable bundle of every report in a run
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationSummary {
    pub gold_entities: usize,
    pub reports: Vec<EvaluationReport>,
}

impl EvaluationSummary {
    pub fn new(gold_entities: usize) -> Self {
        Self {
            gold_entities,
            reports: Vec::new(),
        }
    }

    pub fn push(&mut self, report: EvaluationReport) {
        self.reports.push(report);
    }

    /// Full text report: each set in turn, then the side-by-side comparison
    pub fn render(&self) -> String {
        let mut out = format!(
            "=== Entity Extraction Evaluation ===\n\nGold entities: {}\n\n",
            self.gold_entities
        );
        for report in &self.reports {
            out.push_str(&report.render());
            out.push('\n');
        }
        out.push_str(&render_comparison(&self.reports));
        out
    }
}

// ============================================================================
// Tests
// ============================================================================
