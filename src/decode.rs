//! Code-block decoding.
//!
//! The fence tag of a code block decides how its text becomes endpoint data.
//! Decoding never fails: anything that does not parse is kept verbatim.

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Decoded content of a code block.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// JSON/YAML value, or the verbatim text as a string
    Value(Value),
    /// Handlebars template source
    Template(String),
}

impl Content {
    /// The content as a plain value; templates become their source text.
    pub fn into_value(self) -> Value {
        match self {
            Content::Value(value) => value,
            Content::Template(source) => Value::String(source),
        }
    }

    /// Interpret the content as a header map.
    ///
    /// Objects map names to values, with non-string values rendered as JSON
    /// text. Text is read as `Name: value` lines.
    pub fn into_headers(self) -> HashMap<String, String> {
        match self {
            Content::Value(Value::Object(map)) => headers_from_object(map),
            Content::Value(Value::String(text)) | Content::Template(text) => {
                headers_from_lines(&text)
            }
            Content::Value(other) => {
                debug!(value = %other, "Header block is neither a map nor header lines");
                HashMap::new()
            }
        }
    }
}

/// Decode a code block according to the first word of its fence tag.
pub fn decode_block(syntax: &str, code: &str) -> Content {
    let tag = syntax
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match tag.as_str() {
        "json" => serde_json::from_str::<Value>(code).map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::from_str::<Value>(code).map_err(|e| e.to_string()),
        "hbs" | "handlebars" => return Content::Template(code.to_string()),
        _ => return Content::Value(Value::String(code.to_string())),
    };

    match parsed {
        Ok(value) => Content::Value(value),
        Err(error) => {
            debug!(syntax = %tag, %error, "Code block failed to decode, keeping raw text");
            Content::Value(Value::String(code.to_string()))
        }
    }
}

/// Render a value the way it is compared and written as a header value.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn headers_from_object(map: Map<String, Value>) -> HashMap<String, String> {
    map.into_iter()
        .map(|(name, value)| (name, value_to_string(&value)))
        .collect()
}

fn headers_from_lines(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_json() {
        assert_eq!(
            decode_block("json", r#"{"ok": true, "n": [1, 2]}"#),
            Content::Value(json!({"ok": true, "n": [1, 2]}))
        );
        assert_eq!(
            decode_block("JSON title=example", "[1]"),
            Content::Value(json!([1]))
        );
    }

    #[test]
    fn test_decode_yaml() {
        let yaml = "id: 1\nname: Ann\ntags:\n  - a\n  - b\n";
        assert_eq!(
            decode_block("yaml", yaml),
            Content::Value(json!({"id": 1, "name": "Ann", "tags": ["a", "b"]}))
        );
        assert_eq!(decode_block("yml", "- 1\n"), Content::Value(json!([1])));
    }

    #[test]
    fn test_malformed_blocks_fall_back_to_text() {
        let broken = "{\"ok\": tru";
        assert_eq!(decode_block("json", broken), Content::Value(json!(broken)));

        let broken_yaml = "a: [1, 2\n";
        assert_eq!(decode_block("yaml", broken_yaml), Content::Value(json!(broken_yaml)));
    }

    #[test]
    fn test_other_syntax_is_verbatim() {
        assert_eq!(
            decode_block("", "hello\n"),
            Content::Value(json!("hello\n"))
        );
        assert_eq!(
            decode_block("xml", "<a/>"),
            Content::Value(json!("<a/>"))
        );
    }

    #[test]
    fn test_template_syntax() {
        assert_eq!(
            decode_block("hbs", "Hi {{path}}"),
            Content::Template("Hi {{path}}".to_string())
        );
        assert_eq!(
            decode_block("handlebars", "x").into_value(),
            json!("x")
        );
    }

    #[test]
    fn test_headers_from_object() {
        let headers = Content::Value(json!({"X-Key": "abc", "X-Count": 3, "X-Flag": true}))
            .into_headers();
        assert_eq!(headers.get("X-Key"), Some(&"abc".to_string()));
        assert_eq!(headers.get("X-Count"), Some(&"3".to_string()));
        assert_eq!(headers.get("X-Flag"), Some(&"true".to_string()));
    }

    #[test]
    fn test_headers_from_lines() {
        let headers = Content::Value(json!(
            "Authorization: Bearer a:b\n\nnot a header\nX-Trace :  42 \n"
        ))
        .into_headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("Authorization"), Some(&"Bearer a:b".to_string()));
        assert_eq!(headers.get("X-Trace"), Some(&"42".to_string()));
    }

    #[test]
    fn test_headers_from_scalar_are_empty() {
        assert!(Content::Value(json!(42)).into_headers().is_empty());
    }
}
