//! Entity Set Loader
//!
//! Pulls well-formed `(entity, type)` records out of upstream output that is
//! frequently malformed. Loading never fails: a payload that cannot be read
//! is reported with its source label and yields an empty set, while records
//! with missing fields are skipped silently.

use serde_json::Value;
use tracing::{debug, warn};

use lexeval_core::{EntityRecord, UNKNOWN_TYPE};

const TEXT_FIELDS: [&str; 2] = ["entity", "entidade"];
const TYPE_FIELDS: [&str; 2] = ["type", "tipo"];

/// First present, non-empty string among `fields`
fn string_field<'a>(object: &'a serde_json::Map<String, Value>, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|name| object.get(*name))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
}

fn record_from_element(element: &Value) -> Option<EntityRecord> {
    match element {
        Value::Object(object) => {
            let text = string_field(object, &TEXT_FIELDS)?;
            let entity_type = string_field(object, &TYPE_FIELDS)?;
            Some(EntityRecord::new(text, entity_type))
        }
        Value::String(text) if !text.is_empty() => Some(EntityRecord::new(text, UNKNOWN_TYPE)),
        _ => None,
    }
}

/// Extract entity records from a JSON payload
///
/// A string payload is parsed as JSON first. Anything other than an array
/// is reported and yields nothing.
pub fn load_entities(payload: &Value, source: &str) -> Vec<EntityRecord> {
    let parsed;
    let payload = match payload {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => {
                parsed = value;
                &parsed
            }
            Err(e) => {
                warn!(source, reason = %e, "payload is not valid JSON");
                debug!(source, content = %raw, "rejected payload");
                return Vec::new();
            }
        },
        other => other,
    };

    let Some(elements) = payload.as_array() else {
        warn!(source, kind = value_kind(payload), "payload is not a list of entities");
        return Vec::new();
    };

    let records: Vec<EntityRecord> = elements.iter().filter_map(record_from_element).collect();
    debug!(
        source,
        accepted = records.len(),
        skipped = elements.len() - records.len(),
        "entities loaded"
    );
    records
}

/// Extract entity records from raw text (file contents, model output)
pub fn load_entities_from_str(raw: &str, source: &str) -> Vec<EntityRecord> {
    load_entities(&Value::String(raw.to_string()), source)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loads_corpus_shape() {
        let payload = json!([
            {"entidade": "ACÓRDÃO", "tipo": "Título"},
            {"entidade": "Comarca de São Paulo", "tipo": "Origem"}
        ]);

        let records = load_entities(&payload, "gold");
        assert_eq!(
            records,
            vec![
                EntityRecord::new("ACÓRDÃO", "Título"),
                EntityRecord::new("Comarca de São Paulo", "Origem"),
            ]
        );
    }

    #[test]
    fn test_loads_english_field_names() {
        let payload = json!([{"entity": "Cézar Zalaf", "type": "Nome_Relator"}]);
        assert_eq!(
            load_entities(&payload, "few"),
            vec![EntityRecord::new("Cézar Zalaf", "Nome_Relator")]
        );
    }

    #[test]
    fn test_json_encoded_string_payload() {
        let payload = json!(r#"[{"entidade": "VOTO Nº 5219", "tipo": "Voto"}]"#);
        assert_eq!(
            load_entities(&payload, "zero"),
            vec![EntityRecord::new("VOTO Nº 5219", "Voto")]
        );
    }

    #[test]
    fn test_bare_strings_get_unknown_type() {
        let payload = json!(["Banco do Brasil S/A", "João da Silva"]);

        let records = load_entities(&payload, "one");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.entity_type == UNKNOWN_TYPE));
    }

    #[test]
    fn test_invalid_json_yields_empty() {
        assert!(load_entities_from_str("Aqui estão as entidades: [{", "few").is_empty());
    }

    #[test]
    fn test_non_list_yields_empty() {
        assert!(load_entities(&json!({"entidade": "x", "tipo": "y"}), "few").is_empty());
        assert!(load_entities(&json!(42), "few").is_empty());
        assert!(load_entities(&Value::Null, "few").is_empty());
    }

    #[test]
    fn test_incomplete_and_odd_elements_are_skipped() {
        let payload = json!([
            {"entidade": "sem tipo"},
            {"tipo": "Data"},
            {"entidade": "", "tipo": "Data"},
            {"entidade": "x", "tipo": null},
            {"entidade": 7, "tipo": "Data"},
            42,
            null,
            ["nested"],
            "",
            {"entidade": "15 de agosto de 2022", "tipo": "Data", "extra": true}
        ]);

        assert_eq!(
            load_entities(&payload, "gold"),
            vec![EntityRecord::new("15 de agosto de 2022", "Data")]
        );
    }

    #[test]
    fn test_string_payload_holding_non_list() {
        assert!(load_entities_from_str(r#""just a string""#, "zero").is_empty());
    }
}
