//! Tolerant extraction of JSON answers from model output.
//!
//! Models wrap JSON in code fences, prepend commentary, or drift from the
//! requested shape. These helpers find the first JSON object in the text
//! and read fields one at a time, so a bad field never spoils the others.

use serde_json::{Map, Value};

pub type JsonObject = Map<String, Value>;

/// The first JSON object embedded anywhere in `text`.
///
/// Trailing text after the object is ignored.
pub fn first_json_object(text: &str) -> Option<JsonObject> {
    for (idx, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            return Some(map);
        }
    }
    None
}

/// A string field, trimmed. Empty strings count as missing.
pub fn string_field(obj: &JsonObject, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// An integer field. Accepts numbers (floats are rounded) and numeric strings.
pub fn int_field(obj: &JsonObject, key: &str) -> Option<i64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A list of strings. A bare string is treated as a one-element list;
/// non-string elements are skipped.
pub fn string_list(obj: &JsonObject, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// The first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
