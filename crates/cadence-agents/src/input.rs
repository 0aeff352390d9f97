//! Helpers for reading capability inputs out of request content.

use serde_json::Value;

use cadence_core::capability::CapabilityError;
use cadence_core::message::Message;

/// A required non-blank text input.
pub(crate) fn require_text<'a>(request: &'a Message, key: &str) -> Result<&'a str, CapabilityError> {
    match request.field(key) {
        None | Some(Value::Null) => Err(CapabilityError::MissingInput(key.to_string())),
        Some(Value::String(text)) if text.trim().is_empty() => {
            Err(CapabilityError::MissingInput(key.to_string()))
        }
        Some(Value::String(text)) => Ok(text),
        Some(other) => Err(CapabilityError::invalid_input(
            key,
            format!("expected text, got {}", kind_of(other)),
        )),
    }
}

/// Text carried by `value`: the string itself, or the first of `keys`
/// present on a mapping (serialized when not a string).
///
/// Lets a step take either a literal or an earlier step's mapping output.
pub(crate) fn text_from(value: &Value, keys: &[&str]) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Object(map) => keys.iter().find_map(|key| match map.get(*key) {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
            Some(Value::Null) | Some(Value::String(_)) | None => None,
            Some(other) => Some(other.to_string()),
        }),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_text() {
        let request = Message::new(
            "Engine",
            json!({"topic_query": "Juno", "blank": "  ", "n": 3}),
        );
        assert_eq!(require_text(&request, "topic_query").unwrap(), "Juno");
        assert!(matches!(
            require_text(&request, "blank"),
            Err(CapabilityError::MissingInput(_))
        ));
        assert!(matches!(
            require_text(&request, "absent"),
            Err(CapabilityError::MissingInput(_))
        ));
        assert!(matches!(
            require_text(&request, "n"),
            Err(CapabilityError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_text_from_prefers_keys_in_order() {
        let keys = ["facts", "summary", "answer_with_sources"];
        assert_eq!(text_from(&json!("plain"), &keys).as_deref(), Some("plain"));
        assert_eq!(
            text_from(&json!({"summary": "s", "answer_with_sources": "a"}), &keys).as_deref(),
            Some("s")
        );
        assert_eq!(
            text_from(&json!({"facts": ["a", "b"]}), &keys).as_deref(),
            Some(r#"["a","b"]"#)
        );
        assert_eq!(text_from(&json!({"other": "x"}), &keys), None);
        assert_eq!(text_from(&json!(""), &keys), None);
    }
}
