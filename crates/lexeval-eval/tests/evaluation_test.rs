//! End-to-end evaluation over payloads shaped like real model output

use lexeval_core::EntityRecord;
use lexeval_eval::{
    exact_match, fuzzy_match, load_entities_from_str, normalize, sample_errors, Evaluator,
    TypeMap,
};

const GOLD: &str = r#"[
    {"entidade": "ACÓRDÃO", "tipo": "Título"},
    {"entidade": "Apelação Cível nº 1009452-83.2015.8.26.0004", "tipo": "Nome_Recurso"},
    {"entidade": "Comarca de São Paulo", "tipo": "Origem"},
    {"entidade": "Banco do Brasil S/A", "tipo": "Recorrido"},
    {"entidade": "João da Silva", "tipo": "Recorrente"},
    {"entidade": "15 de agosto de 2022", "tipo": "Data"}
]"#;

const FEWSHOT: &str = r#"```json
[
    {"entity": "acordao", "type": "Titulo"},
    {"entity": "Apelação Cível n. 1009452-83.2015.8.26.0004", "type": "Nome_Recurso"},
    {"entity": "Comarca de Sao Paulo", "type": "Origem"},
    {"entity": "Banco do Brasil S.A.", "type": "Recorrido"},
    {"entity": "joao da silva", "type": "Recorrente"},
    {"entity": "Cézar Zalaf", "type": "Nome_Relator"}
]
```"#;

#[test]
fn test_joao_da_silva_raw_vs_normalized() {
    let pred = vec![EntityRecord::new("joao da silva", "Recorrente")];
    let gold = vec![EntityRecord::new("João da Silva", "Recorrente")];

    let raw = exact_match(&pred, &gold);
    assert_eq!(raw.true_positives, 0);

    let type_map = TypeMap::new();
    let report = Evaluator::new(type_map, 0.92).evaluate("norm", &pred, &gold);
    assert_eq!(report.exact.true_positives, 1);
    assert_eq!(report.exact.f1, 1.0);
}

#[test]
fn test_fenced_payload_does_not_load() {
    // Code fences are stripped by the response parser, not the loader
    assert!(load_entities_from_str(FEWSHOT, "fewshot").is_empty());
}

#[test]
fn test_full_pipeline() {
    let gold = load_entities_from_str(GOLD, "gold");
    assert_eq!(gold.len(), 6);

    let body = FEWSHOT
        .trim_start_matches("```json")
        .trim_end_matches("```");
    let pred = load_entities_from_str(body, "fewshot");
    assert_eq!(pred.len(), 6);

    let evaluator = Evaluator::new(TypeMap::acordao_default(), 0.92);
    let report = evaluator.evaluate("fewshot", &pred, &gold);

    // Title, appeal, origin and appellant agree once canonicalized
    assert_eq!(report.exact.true_positives, 4);
    assert_eq!(report.exact.false_positives, 2);
    assert_eq!(report.exact.false_negatives, 2);

    // "banco do brasil s.a." vs "banco do brasil s/a" is close enough
    assert_eq!(report.fuzzy.true_positives, 5);
    assert!(report.fuzzy.f1 > report.exact.f1);

    let types: Vec<&str> = report.per_type.iter().map(|r| r.entity_type.as_str()).collect();
    let mut sorted = types.clone();
    sorted.sort_unstable();
    assert_eq!(types, sorted);

    let text = report.render();
    assert!(text.contains("- Pessoa: "));
}

#[test]
fn test_abbreviation_forms_collapse() {
    let forms = ["Apelação nº 123", "apelacao n. 123", "APELAÇÃO Nº 123"];
    let normalized: Vec<String> = forms.iter().map(|f| normalize(f)).collect();
    assert!(normalized.iter().all(|n| n == "apelacao nº 123"));
}

#[test]
fn test_fuzzy_threshold_extremes() {
    let pred = vec![EntityRecord::new("banco do brasil", "Recorrido")];
    let gold = vec![EntityRecord::new("banco brasil", "Recorrido")];

    assert_eq!(fuzzy_match(&pred, &gold, 1.0).true_positives, 0);
    assert_eq!(fuzzy_match(&pred, &gold, 0.5).true_positives, 1);
}

#[test]
fn test_sampling_bound() {
    let pred: Vec<EntityRecord> = (0..8)
        .map(|i| EntityRecord::new(format!("pred {i}"), "Data"))
        .collect();
    let gold: Vec<EntityRecord> = (0..5)
        .map(|i| EntityRecord::new(format!("gold {i}"), "Data"))
        .collect();

    let samples = sample_errors(&pred, &gold, 3);
    assert_eq!(samples.false_positives.len(), 3);
    assert_eq!(samples.false_negatives.len(), 3);
    assert_eq!(samples.false_positives[0].text, "pred 0");
}
