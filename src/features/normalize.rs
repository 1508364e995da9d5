use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

pub type JsonObject = Map<String, Value>;

/// A fixed, fully-defaulted shape built from whatever keys the model chose
/// to return. Building one never fails.
pub trait NormalizedShape: Sized {
    fn normalize(object: &JsonObject) -> Self;
}

static TAG_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,;]+").expect("tag separator regex is valid"));

/// Scalars are rendered as text; null, lists and objects become `""`.
pub fn string_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

pub fn string_field(object: &JsonObject, key: &str) -> String {
    object.get(key).map(string_value).unwrap_or_default()
}

/// First key present with an array value.
pub fn array_field<'a>(object: &'a JsonObject, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_array))
}

/// Non-empty trimmed strings from either a JSON list or a single
/// whitespace/comma separated string.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(string_value)
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        Some(Value::String(text)) => TAG_SEPARATOR
            .split(text)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn mistyped_fields_fall_back_to_empty() {
        let obj = object(json!({ "a": ["x"], "b": null, "c": { "k": 1 }, "d": 4, "e": true }));
        assert_eq!(string_field(&obj, "a"), "");
        assert_eq!(string_field(&obj, "b"), "");
        assert_eq!(string_field(&obj, "c"), "");
        assert_eq!(string_field(&obj, "d"), "4");
        assert_eq!(string_field(&obj, "e"), "true");
        assert_eq!(string_field(&obj, "missing"), "");
    }

    #[test]
    fn array_field_skips_non_arrays() {
        let obj = object(json!({ "prompts": "oops", "poses": [1] }));
        assert_eq!(array_field(&obj, &["prompts", "poses"]).map(Vec::len), Some(1));
        assert_eq!(array_field(&obj, &["nothing"]), None);
    }

    #[test]
    fn string_lists_accept_lists_and_separated_text() {
        assert_eq!(
            string_list(Some(&json!(["#a", " b ", "", null, 3]))),
            vec!["#a", "b", "3"]
        );
        assert_eq!(
            string_list(Some(&json!("#sun, #sky  #sea"))),
            vec!["#sun", "#sky", "#sea"]
        );
        assert!(string_list(Some(&json!({ "x": 1 }))).is_empty());
        assert!(string_list(None).is_empty());
    }
}
