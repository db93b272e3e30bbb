//! Lenient parsing of model responses
//!
//! Models wrap JSON in Markdown fences, return JSON-encoded strings, nest the
//! list under a key, or surround it with prose. Parsing never fails: text
//! that cannot be recovered is handed on as a JSON string, and the loader
//! reports it.

use serde_json::Value;
use tracing::debug;

/// Remove a surrounding Markdown code fence (with optional `json` tag)
pub fn strip_code_fences(raw: &str) -> &str {
    let s = raw.trim();
    let Some(body) = s.strip_prefix("```") else {
        return s;
    };

    let body = body.strip_prefix("json").unwrap_or(body);
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}

/// Take the list out of an object wrapper (`{"entidades": [...]}`)
///
/// The first array-valued field in key order wins. Anything else is
/// returned unchanged.
fn unwrap_payload(value: Value) -> Value {
    match value {
        Value::Object(object) => {
            let list = object.values().find(|v| v.is_array()).cloned();
            list.unwrap_or(Value::Object(object))
        }
        other => other,
    }
}

fn parse_value(s: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(s).ok()? {
        // JSON inside a JSON string
        Value::String(inner) => match serde_json::from_str::<Value>(&inner) {
            Ok(value) => Some(unwrap_payload(value)),
            Err(_) => Some(Value::String(inner)),
        },
        value => Some(unwrap_payload(value)),
    }
}

/// Outermost `[...]` substring of free text
fn bracketed(s: &str) -> Option<&str> {
    let start = s.find('[')?;
    let end = s.rfind(']')?;
    (start < end).then(|| &s[start..=end])
}

/// Best-effort JSON payload from a model response
pub fn parse_llm_json(raw: &str) -> Value {
    let s = strip_code_fences(raw);

    if let Some(value) = parse_value(s) {
        return value;
    }

    if let Some(value) = bracketed(s).and_then(|inner| serde_json::from_str::<Value>(inner).ok()) {
        debug!("recovered list from surrounding text");
        return value;
    }

    Value::String(raw.to_string())
}
