//! Endpoint records and the ordered endpoint collection.
//!
//! An [`Endpoint`] pairs a request description (what to match) with a canned
//! response. [`Endpoints`] keeps records in declaration order, which is also
//! their match priority.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Content type every response starts out with.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Status every response starts out with.
pub const DEFAULT_STATUS: u16 = 200;

/// URL of an endpoint, either literal or a regular expression.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// Exact, case-sensitive match
    Literal(String),
    /// Pattern test against the request URL
    Regex(Regex),
}

impl UrlPattern {
    /// Build a pattern from a heading token. A leading `~` marks a regex.
    pub fn parse(token: &str) -> Result<Self, regex::Error> {
        match token.strip_prefix('~') {
            Some(pattern) => Ok(UrlPattern::Regex(Regex::new(pattern)?)),
            None => Ok(UrlPattern::Literal(token.to_string())),
        }
    }

    /// Whether `url` satisfies this pattern.
    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Literal(value) => value == url,
            UrlPattern::Regex(regex) => regex.is_match(url),
        }
    }

    /// Numbered and named capture groups of a regex pattern against `url`.
    pub fn captures(&self, url: &str) -> HashMap<String, String> {
        let mut result = HashMap::new();
        let UrlPattern::Regex(regex) = self else {
            return result;
        };
        if let Some(captures) = regex.captures(url) {
            for (i, cap) in captures.iter().enumerate().skip(1) {
                if let Some(m) = cap {
                    result.insert(i.to_string(), m.as_str().to_string());
                }
            }
            for name in regex.capture_names().flatten() {
                if let Some(m) = captures.name(name) {
                    result.insert(name.to_string(), m.as_str().to_string());
                }
            }
        }
        result
    }

    /// Source text of the pattern, without the `~` marker.
    pub fn as_str(&self) -> &str {
        match self {
            UrlPattern::Literal(value) => value,
            UrlPattern::Regex(regex) => regex.as_str(),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, UrlPattern::Regex(_))
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.is_regex() == other.is_regex() && self.as_str() == other.as_str()
    }
}

impl Serialize for UrlPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UrlPattern::Literal(value) => serializer.serialize_str(value),
            UrlPattern::Regex(regex) => serializer.serialize_str(&format!("~{}", regex.as_str())),
        }
    }
}

/// Request side of an endpoint. `None` fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestFields {
    pub method: Option<String>,
    pub url: Option<UrlPattern>,
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
}

/// Response body of an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Structured value or verbatim string
    Value(serde_json::Value),
    /// Handlebars template rendered per request
    Template(String),
}

/// Response side of an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseFields {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<ResponseBody>,
}

impl Default for ResponseFields {
    fn default() -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string());
        Self {
            status: DEFAULT_STATUS,
            headers,
            body: None,
        }
    }
}

impl ResponseFields {
    /// Set the `Content-Type` header, replacing any casing of it.
    pub fn set_content_type(&mut self, content_type: &str) {
        self.headers
            .retain(|name, _| !name.eq_ignore_ascii_case("content-type"));
        self.headers
            .insert("Content-Type".to_string(), content_type.to_string());
    }

    /// Current `Content-Type` header, looked up case-insensitively.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }
}

/// One documented request-matching rule paired with a canned response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Endpoint {
    /// Ordinal of the route heading this record was built from
    pub route: usize,
    /// Ordinal of this record among the variants of its route
    pub variant: usize,
    pub request: RequestFields,
    pub response: ResponseFields,
}

impl Endpoint {
    /// Create an endpoint for route `route` with wildcard request fields.
    pub fn new(route: usize) -> Self {
        Self {
            route,
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.request.method = Some(method.to_uppercase());
        self
    }

    pub fn with_url(mut self, url: UrlPattern) -> Self {
        self.request.url = Some(url);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.request
            .headers
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.request.body = Some(body);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.response.status = status;
        self
    }

    /// Deep copy tagged as the next variant of the same route.
    pub fn next_variant(&self) -> Self {
        Self {
            variant: self.variant + 1,
            ..self.clone()
        }
    }
}

/// A request as seen by the matching engine. `None` fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockRequest {
    pub method: Option<String>,
    pub url: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
}

impl MockRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Build a request that carries exactly the request fields of `endpoint`.
    /// Regex URLs become a wildcard URL.
    pub fn from_endpoint(endpoint: &Endpoint) -> Self {
        let fields = &endpoint.request;
        Self {
            method: fields.method.clone(),
            url: match &fields.url {
                Some(UrlPattern::Literal(url)) => Some(url.clone()),
                _ => None,
            },
            headers: fields.headers.clone(),
            body: fields.body.clone(),
        }
    }
}

/// Ordered, append-only endpoint collection. Insertion order is match priority.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Endpoints {
    endpoints: Vec<Endpoint>,
}

impl Endpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn add(&mut self, endpoint: Endpoint) -> &Endpoint {
        self.endpoints.push(endpoint);
        &self.endpoints[self.endpoints.len() - 1]
    }

    /// Append a deep copy of `endpoint`, tagged as the next variant of its route.
    pub fn clone_endpoint(&mut self, endpoint: &Endpoint) -> &Endpoint {
        let variant = self
            .variants_of(endpoint.route)
            .map(|e| e.variant + 1)
            .max()
            .unwrap_or(0)
            .max(endpoint.variant + 1);
        self.add(Endpoint {
            variant,
            ..endpoint.clone()
        })
    }

    /// First record, in declaration order, that matches the request.
    pub fn find_by_request(&self, request: &MockRequest) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.matches_request(request))
    }

    pub fn some_by_request(&self, request: &MockRequest) -> bool {
        self.endpoints.iter().any(|e| e.matches_request(request))
    }

    /// Whether any record's URL accepts `url`, regardless of the other fields.
    pub fn some_by_url(&self, url: &str) -> bool {
        self.endpoints.iter().any(|e| e.matches_url(url))
    }

    /// All variants built from route heading `route`, in order.
    pub fn variants_of(&self, route: usize) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter().filter(move |e| e.route == route)
    }

    /// Number of distinct route headings represented.
    pub fn routes(&self) -> usize {
        let mut routes: Vec<usize> = self.endpoints.iter().map(|e| e.route).collect();
        routes.sort_unstable();
        routes.dedup();
        routes.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl<'a> IntoIterator for &'a Endpoints {
    type Item = &'a Endpoint;
    type IntoIter = std::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.iter()
    }
}

impl FromIterator<Endpoint> for Endpoints {
    fn from_iter<I: IntoIterator<Item = Endpoint>>(iter: I) -> Self {
        Self {
            endpoints: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn literal(url: &str) -> UrlPattern {
        UrlPattern::parse(url).unwrap()
    }

    #[test]
    fn test_url_pattern_parse() {
        assert_eq!(literal("/users"), UrlPattern::Literal("/users".to_string()));
        assert!(literal(r"~^/users/\d+$").is_regex());
        assert!(UrlPattern::parse("~(unclosed").is_err());
    }

    #[test]
    fn test_url_pattern_captures() {
        let pattern = literal(r"~^/users/(?P<id>\d+)/posts/(\d+)$");
        let captures = pattern.captures("/users/7/posts/42");
        assert_eq!(captures.get("id"), Some(&"7".to_string()));
        assert_eq!(captures.get("1"), Some(&"7".to_string()));
        assert_eq!(captures.get("2"), Some(&"42".to_string()));

        assert!(literal("/users").captures("/users").is_empty());
    }

    #[test]
    fn test_response_defaults() {
        let endpoint = Endpoint::new(0);
        assert_eq!(endpoint.response.status, 200);
        assert_eq!(endpoint.response.content_type(), Some(DEFAULT_CONTENT_TYPE));
        assert!(endpoint.request.method.is_none());
        assert!(endpoint.request.url.is_none());
    }

    #[test]
    fn test_set_content_type_replaces_any_casing() {
        let mut response = ResponseFields::default();
        response
            .headers
            .insert("content-type".to_string(), "text/html".to_string());
        response.set_content_type("text/plain");

        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(response.headers.len(), 1);
    }

    #[test]
    fn test_next_variant_is_independent() {
        let original = Endpoint::new(3)
            .with_method("get")
            .with_url(literal("/users"))
            .with_header("X-Key", "abc");
        let mut copy = original.next_variant();
        copy.request.headers.insert("X-Other".to_string(), "1".to_string());
        copy.response.status = 404;

        assert_eq!(copy.route, 3);
        assert_eq!(copy.variant, 1);
        assert_eq!(original.request.headers.len(), 1);
        assert_eq!(original.response.status, 200);
        assert_eq!(original.request.method.as_deref(), Some("GET"));
    }

    #[test]
    fn test_clone_endpoint_appends_new_variant() {
        let mut endpoints = Endpoints::new();
        let first = endpoints
            .add(Endpoint::new(0).with_url(literal("/a")))
            .clone();
        let second = endpoints.clone_endpoint(&first).clone();
        let third = endpoints.clone_endpoint(&first).clone();

        assert_eq!(endpoints.len(), 3);
        assert_eq!(second.variant, 1);
        assert_eq!(third.variant, 2);
        assert_eq!(endpoints.routes(), 1);
        assert_eq!(endpoints.variants_of(0).count(), 3);
    }

    #[test]
    fn test_find_by_request_first_match_wins() {
        let endpoints: Endpoints = vec![
            Endpoint::new(0)
                .with_url(literal("/users"))
                .with_header("X-Key", "abc")
                .with_status(201),
            Endpoint::new(1).with_url(literal("/users")).with_status(202),
        ]
        .into_iter()
        .collect();

        let with_header = MockRequest::new().url("/users").header("x-key", "abc");
        assert_eq!(
            endpoints.find_by_request(&with_header).map(|e| e.response.status),
            Some(201)
        );

        let without_header = MockRequest::new().url("/users");
        assert_eq!(
            endpoints.find_by_request(&without_header).map(|e| e.response.status),
            Some(202)
        );
    }

    #[test]
    fn test_some_by_url_and_request() {
        let endpoints: Endpoints = vec![Endpoint::new(0)
            .with_method("POST")
            .with_url(literal("/login"))
            .with_body(json!({"user": "admin"}))]
        .into_iter()
        .collect();

        assert!(endpoints.some_by_url("/login"));
        assert!(!endpoints.some_by_url("/logout"));

        let wrong_body = MockRequest::new()
            .method("POST")
            .url("/login")
            .body(json!({"user": "guest"}));
        assert!(!endpoints.some_by_request(&wrong_body));
        assert!(endpoints.find_by_request(&wrong_body).is_none());
    }

    #[test]
    fn test_from_endpoint_drops_regex_url() {
        let endpoint = Endpoint::new(0).with_url(literal("~^/x"));
        assert!(MockRequest::from_endpoint(&endpoint).url.is_none());
    }

    #[test]
    fn test_serialize_regex_url_with_marker() {
        let endpoint = Endpoint::new(0).with_url(literal(r"~^/users/\d+$"));
        let value = serde_json::to_value(&endpoint).unwrap();
        assert_eq!(value["request"]["url"], json!(r"~^/users/\d+$"));
        assert_eq!(value["response"]["status"], json!(200));
    }
}
