//! Reporter
//!
//! Per-type breakdowns and the human-readable evaluation report.

use std::collections::BTreeSet;

use serde::Serialize;

use lexeval_core::EntityRecord;

use crate::metrics::{exact_match, MatchResult};
use crate::sampling::ErrorSamples;

/// Exact-match scores restricted to one entity type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeReport {
    pub entity_type: String,
    #[serde(flatten)]
    pub result: MatchResult,
}

impl std::fmt::Display for TypeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "- {}: {}", self.entity_type, self.result.summary(2))
    }
}

/// One report per type in the union of both sets, sorted by type
pub fn per_type_report(prediction: &[EntityRecord], gold: &[EntityRecord]) -> Vec<TypeReport> {
    let types: BTreeSet<&str> = prediction
        .iter()
        .chain(gold)
        .map(|r| r.entity_type.as_str())
        .collect();

    types
        .into_iter()
        .map(|entity_type| {
            let pred_t: Vec<EntityRecord> = of_type(prediction, entity_type);
            let gold_t: Vec<EntityRecord> = of_type(gold, entity_type);
            TypeReport {
                entity_type: entity_type.to_string(),
                result: exact_match(&pred_t, &gold_t),
            }
        })
        .collect()
}

fn of_type(records: &[EntityRecord], entity_type: &str) -> Vec<EntityRecord> {
    records
        .iter()
        .filter(|r| r.entity_type == entity_type)
        .cloned()
        .collect()
}

/// Render per-type lines, one per type
pub fn render_type_reports(reports: &[TypeReport]) -> String {
    reports
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Everything computed for one prediction set
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// Experiment name (e.g. "fewshot")
    pub name: String,
    pub predicted_entities: usize,
    pub exact: MatchResult,
    pub fuzzy: MatchResult,
    pub fuzzy_threshold: f64,
    pub per_type: Vec<TypeReport>,
    pub errors: ErrorSamples,
}

impl EvaluationReport {
    /// Multi-section text report
    pub fn render(&self) -> String {
        let mut out = format!(
            "=== {} ({} entities) ===\n\
             Exact (entity+type): {}\n\
             Fuzzy (threshold={}): {}\n",
            self.name,
            self.predicted_entities,
            self.exact,
            self.fuzzy_threshold,
            self.fuzzy,
        );

        if !self.per_type.is_empty() {
            out.push_str("Per type (exact):\n");
            out.push_str(&render_type_reports(&self.per_type));
            out.push('\n');
        }

        if !self.errors.false_positives.is_empty() {
            out.push_str(&format!("FP: {}\n", join_records(&self.errors.false_positives)));
        }
        if !self.errors.false_negatives.is_empty() {
            out.push_str(&format!("FN: {}\n", join_records(&self.errors.false_negatives)));
        }

        out
    }
}

fn join_records(records: &[EntityRecord]) -> String {
    records
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Side-by-side comparison of several experiments against the same gold
pub fn render_comparison(reports: &[EvaluationReport]) -> String {
    let mut out = String::from("=== EXACT (entity+type) ===\n");
    for report in reports {
        out.push_str(&format!("[{}] {}\n", report.name, report.exact));
    }

    out.push_str("\n=== FUZZY ===\n");
    for report in reports {
        out.push_str(&format!(
            "[{}] (threshold={}) {}\n",
            report.name, report.fuzzy_threshold, report.fuzzy
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(pairs: &[(&str, &str)]) -> Vec<EntityRecord> {
        pairs.iter().map(|(t, ty)| EntityRecord::new(*t, *ty)).collect()
    }

    #[test]
    fn test_per_type_report_sorted_union() {
        let pred = records(&[("a", "Voto"), ("x", "Data"), ("y", "Data")]);
        let gold = records(&[("x", "Data"), ("c", "Origem")]);

        let reports = per_type_report(&pred, &gold);
        let types: Vec<&str> = reports.iter().map(|r| r.entity_type.as_str()).collect();
        assert_eq!(types, vec!["Data", "Origem", "Voto"]);

        let data = &reports[0].result;
        assert_eq!((data.true_positives, data.false_positives, data.false_negatives), (1, 1, 0));

        let origem = &reports[1].result;
        assert_eq!((origem.true_positives, origem.false_negatives), (0, 1));

        let voto = &reports[2].result;
        assert_eq!((voto.false_positives, voto.precision), (1, 0.0));
    }

    #[test]
    fn test_type_report_line() {
        let reports = per_type_report(&records(&[("x", "Data")]), &records(&[("x", "Data")]));
        assert_eq!(
            render_type_reports(&reports),
            "- Data: TP=1 FP=0 FN=0 | P=1.00 R=1.00 F1=1.00"
        );
    }

    #[test]
    fn test_empty_sets_have_no_lines() {
        assert!(per_type_report(&[], &[]).is_empty());
    }

    #[test]
    fn test_render_sections() {
        let report = EvaluationReport {
            name: "fewshot".to_string(),
            predicted_entities: 2,
            exact: MatchResult::from_counts(1, 1, 0),
            fuzzy: MatchResult::from_counts(1, 1, 0),
            fuzzy_threshold: 0.92,
            per_type: Vec::new(),
            errors: ErrorSamples {
                false_positives: records(&[("ruído", "Data")]),
                false_negatives: Vec::new(),
            },
        };

        let text = report.render();
        assert!(text.starts_with("=== fewshot (2 entities) ==="));
        assert!(text.contains("Fuzzy (threshold=0.92): TP=1 FP=1 FN=0"));
        assert!(text.contains("FP: (\"ruído\", \"Data\")"));
        assert!(!text.contains("FN:"));

        let comparison = render_comparison(&[report]);
        assert!(comparison.contains("[fewshot] TP=1 FP=1 FN=0"));
    }
}
