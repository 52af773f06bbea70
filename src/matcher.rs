//! Request matching logic.
//!
//! Decides whether an incoming request satisfies an endpoint's request side.
//! Every criterion is a wildcard when absent, and headers and object bodies
//! are subset matches: the endpoint lists what matters, the request may carry
//! more.

use crate::endpoint::{Endpoint, MockRequest};
use serde_json::{Map, Value};
use std::collections::HashMap;

impl Endpoint {
    /// Whether `request` satisfies method, URL, headers and body of this endpoint.
    pub fn matches_request(&self, request: &MockRequest) -> bool {
        let fields = &self.request;

        // Check method
        if let (Some(expected), Some(actual)) = (&fields.method, &request.method) {
            if !expected.eq_ignore_ascii_case(actual) {
                return false;
            }
        }

        // Check URL
        if let (Some(pattern), Some(url)) = (&fields.url, &request.url) {
            if !pattern.matches(url) {
                return false;
            }
        }

        // Check headers
        if !matches_headers(&fields.headers, &request.headers) {
            return false;
        }

        // Check body
        match &fields.body {
            Some(expected) => matches_body(expected, request.body.as_ref()),
            None => true,
        }
    }

    /// Whether `url` is accepted by this endpoint's URL. A wildcard URL accepts any.
    pub fn matches_url(&self, url: &str) -> bool {
        self.request
            .url
            .as_ref()
            .map(|pattern| pattern.matches(url))
            .unwrap_or(true)
    }
}

fn matches_headers(expected: &HashMap<String, String>, actual: &HashMap<String, String>) -> bool {
    expected.iter().all(|(name, value)| {
        actual
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v == value)
            .unwrap_or(false)
    })
}

fn matches_body(expected: &Value, actual: Option<&Value>) -> bool {
    match (expected, actual) {
        (Value::Object(fields), Some(Value::Object(actual))) => matches_fields(fields, actual, 1),
        (Value::Object(_), _) => false,
        (expected, Some(actual)) => expected == actual,
        (_, None) => false,
    }
}

/// Subset comparison of object fields. Nested objects recurse while `depth` allows.
fn matches_fields(expected: &Map<String, Value>, actual: &Map<String, Value>, depth: usize) -> bool {
    expected.iter().all(|(key, value)| match (value, actual.get(key)) {
        (Value::Object(nested), Some(Value::Object(other))) if depth > 0 => {
            matches_fields(nested, other, depth - 1)
        }
        (value, Some(other)) => value == other,
        (_, None) => false,
    })
}

/// Parse a query string into key-value pairs.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        if let Some((key, value)) = part.split_once('=') {
            params.insert(urlencoding_decode(key), urlencoding_decode(value));
        } else {
            params.insert(urlencoding_decode(part), String::new());
        }
    }

    params
}

/// Percent-decoding with `+` as space. Invalid escapes are kept as-is.
fn urlencoding_decode(s: &str) -> String {
    let spaced = s.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}
