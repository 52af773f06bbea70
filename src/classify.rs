//! Block classification.
//!
//! Maps tokenizer nodes onto the vocabulary of the endpoint parser: route
//! headings (`GET /users 200`), field-group headings (`Request headers`,
//! `Then body (404)`), code blocks, and everything else.

use crate::endpoint::UrlPattern;
use crate::markdown::Node;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

static ENDPOINT_HEADING: Lazy<Regex> = Lazy::new(|| {
    heading_regex(r"(?P<method>delete|get|head|patch|post|put)\s+(?P<url>\S+)(?:\s+\(?(?P<status>[1-5]\d{2})\)?)?")
});
static RESPONSE_HEADERS: Lazy<Regex> = Lazy::new(|| {
    heading_regex(r"(?:then(?:\s+res(?:ponse)?)?|res(?:ponse)?)\s+head(?:ers?)?(?:\s+\(?(?P<status>[1-5]\d{2})\)?)?")
});
static RESPONSE_BODY: Lazy<Regex> = Lazy::new(|| {
    heading_regex(r"(?:then(?:\s+res(?:ponse)?)?|res(?:ponse)?)(?:\s+(?:body|content|json|data))?(?:\s+\(?(?P<status>[1-5]\d{2})\)?)?")
});
static REQUEST_HEADERS: Lazy<Regex> = Lazy::new(|| {
    heading_regex(r"(?:if(?:\s+req(?:uest)?)?|req(?:uest)?)\s+head(?:ers?)?")
});
static REQUEST_BODY: Lazy<Regex> = Lazy::new(|| {
    heading_regex(r"(?:if(?:\s+req(?:uest)?)?|req(?:uest)?)(?:\s+(?:body|content|json|data))?")
});

/// Anchor a heading prefix, append the optional `(type/subtype)` hint and
/// require a word boundary after it.
fn heading_regex(prefix: &str) -> Regex {
    let pattern = format!(r"(?i)^{prefix}(?:\s+\((?P<ctype>[^()\s/]+/[^()]+)\))?(?:\s|$)");
    Regex::new(&pattern).expect("heading patterns are valid")
}

/// Which half of an endpoint a field group belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Request,
    Response,
}

/// Which part of a request or response a field group fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Headers,
    Body,
}

/// One of the four data sections of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub group: Group,
    pub field: Field,
}

impl Slot {
    pub const REQUEST_HEADERS: Slot = Slot::new(Group::Request, Field::Headers);
    pub const REQUEST_BODY: Slot = Slot::new(Group::Request, Field::Body);
    pub const RESPONSE_HEADERS: Slot = Slot::new(Group::Response, Field::Headers);
    pub const RESPONSE_BODY: Slot = Slot::new(Group::Response, Field::Body);

    pub const fn new(group: Group, field: Field) -> Self {
        Self { group, field }
    }
}

/// A recognized route heading.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointHeading {
    /// Upper-cased HTTP method
    pub method: String,
    pub url: UrlPattern,
    pub status: Option<u16>,
    pub content_type: Option<String>,
}

/// A recognized field-group heading.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGroupHeading {
    pub slot: Slot,
    /// Only ever set for response groups
    pub status: Option<u16>,
    pub content_type: Option<String>,
}

/// Classification of a single node.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    EndpointHeading(EndpointHeading),
    FieldGroupHeading(FieldGroupHeading),
    CodeBlock { syntax: String, code: String },
    Ignored,
}

/// Classify a node.
pub fn classify(node: &Node) -> Block {
    match node {
        Node::Heading { text, .. } => classify_heading(text),
        Node::CodeBlock { syntax, code } => Block::CodeBlock {
            syntax: syntax.clone(),
            code: code.clone(),
        },
        Node::Other => Block::Ignored,
    }
}

/// Classify heading text. The first matching pattern wins, headers before body.
pub fn classify_heading(text: &str) -> Block {
    if let Some(caps) = ENDPOINT_HEADING.captures(text) {
        let token = &caps["url"];
        return match UrlPattern::parse(token) {
            Ok(url) => Block::EndpointHeading(EndpointHeading {
                method: caps["method"].to_uppercase(),
                url,
                status: status_of(&caps),
                content_type: content_type_of(&caps),
            }),
            Err(e) => {
                warn!(heading = %text, error = %e, "Ignoring endpoint heading with invalid URL pattern");
                Block::Ignored
            }
        };
    }

    let groups: [(&Lazy<Regex>, Slot); 4] = [
        (&RESPONSE_HEADERS, Slot::RESPONSE_HEADERS),
        (&RESPONSE_BODY, Slot::RESPONSE_BODY),
        (&REQUEST_HEADERS, Slot::REQUEST_HEADERS),
        (&REQUEST_BODY, Slot::REQUEST_BODY),
    ];

    groups
        .iter()
        .find_map(|(regex, slot)| {
            regex.captures(text).map(|caps| {
                Block::FieldGroupHeading(FieldGroupHeading {
                    slot: *slot,
                    status: status_of(&caps),
                    content_type: content_type_of(&caps),
                })
            })
        })
        .unwrap_or(Block::Ignored)
}

fn status_of(caps: &Captures) -> Option<u16> {
    caps.name("status").and_then(|m| m.as_str().parse().ok())
}

fn content_type_of(caps: &Captures) -> Option<String> {
    caps.name("ctype").map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(text: &str) -> EndpointHeading {
        match classify_heading(text) {
            Block::EndpointHeading(heading) => heading,
            other => panic!("expected endpoint heading for {text:?}, got {other:?}"),
        }
    }

    fn field_group(text: &str) -> FieldGroupHeading {
        match classify_heading(text) {
            Block::FieldGroupHeading(heading) => heading,
            other => panic!("expected field group for {text:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_endpoint_heading_variants() {
        let plain = endpoint("GET /users");
        assert_eq!(plain.method, "GET");
        assert_eq!(plain.url, UrlPattern::Literal("/users".to_string()));
        assert_eq!(plain.status, None);
        assert_eq!(plain.content_type, None);

        let with_status = endpoint("post /users 201");
        assert_eq!(with_status.method, "POST");
        assert_eq!(with_status.status, Some(201));

        let parenthesized = endpoint("DELETE /users/1 (204)");
        assert_eq!(parenthesized.status, Some(204));

        let full = endpoint("Patch /users/1 200 (text/plain; charset=utf-8) trailing words");
        assert_eq!(full.method, "PATCH");
        assert_eq!(full.status, Some(200));
        assert_eq!(full.content_type.as_deref(), Some("text/plain; charset=utf-8"));

        let hint_only = endpoint("HEAD /ping (text/plain)");
        assert_eq!(hint_only.status, None);
        assert_eq!(hint_only.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_regex_endpoint_heading() {
        let heading = endpoint(r"GET ~^/users/\d+$");
        assert!(heading.url.is_regex());
        assert!(heading.url.matches("/users/12"));
    }

    #[test]
    fn test_malformed_endpoint_headings_are_ignored() {
        assert_eq!(classify_heading("GET"), Block::Ignored);
        assert_eq!(classify_heading("OPTIONS /users"), Block::Ignored);
        assert_eq!(classify_heading("Getting started"), Block::Ignored);
        assert_eq!(classify_heading("GET ~(unclosed"), Block::Ignored);
    }

    #[test]
    fn test_field_group_phrasings() {
        let cases = [
            ("Request headers", Slot::REQUEST_HEADERS),
            ("req head", Slot::REQUEST_HEADERS),
            ("If headers", Slot::REQUEST_HEADERS),
            ("if request header", Slot::REQUEST_HEADERS),
            ("Request body", Slot::REQUEST_BODY),
            ("Request", Slot::REQUEST_BODY),
            ("request json", Slot::REQUEST_BODY),
            ("If", Slot::REQUEST_BODY),
            ("Response headers", Slot::RESPONSE_HEADERS),
            ("res header", Slot::RESPONSE_HEADERS),
            ("Then response headers", Slot::RESPONSE_HEADERS),
            ("Response body", Slot::RESPONSE_BODY),
            ("response content", Slot::RESPONSE_BODY),
            ("Response", Slot::RESPONSE_BODY),
            ("Then", Slot::RESPONSE_BODY),
            ("then body for admins", Slot::RESPONSE_BODY),
        ];
        for (text, slot) in cases {
            assert_eq!(field_group(text).slot, slot, "{text}");
        }
    }

    #[test]
    fn test_headers_take_precedence_over_body() {
        // "Response headers" also satisfies the looser body pattern.
        assert!(RESPONSE_BODY.is_match("Response headers"));
        assert_eq!(field_group("Response headers").slot, Slot::RESPONSE_HEADERS);
        assert!(REQUEST_BODY.is_match("Request headers"));
        assert_eq!(field_group("Request headers").slot, Slot::REQUEST_HEADERS);
    }

    #[test]
    fn test_status_only_on_response_groups() {
        let response = field_group("Response body 404");
        assert_eq!(response.status, Some(404));

        let response_headers = field_group("Response headers (500)");
        assert_eq!(response_headers.status, Some(500));

        let request = field_group("Request body 404");
        assert_eq!(request.slot, Slot::REQUEST_BODY);
        assert_eq!(request.status, None);
    }

    #[test]
    fn test_content_type_hint() {
        let response = field_group("Response body 200 (text/html)");
        assert_eq!(response.status, Some(200));
        assert_eq!(response.content_type.as_deref(), Some("text/html"));

        let request = field_group("Request body (application/xml)");
        assert_eq!(request.content_type.as_deref(), Some("application/xml"));

        // A parenthesized word without a slash is not a content type.
        assert_eq!(field_group("Response body (draft)").content_type, None);
    }

    #[test]
    fn test_unrelated_headings_are_ignored() {
        for text in ["Resources", "Results", "Introduction", "Requirements", "Iffy"] {
            assert_eq!(classify_heading(text), Block::Ignored, "{text}");
        }
    }

    #[test]
    fn test_classify_nodes() {
        let code = Node::CodeBlock {
            syntax: "json".to_string(),
            code: "{}".to_string(),
        };
        assert_eq!(
            classify(&code),
            Block::CodeBlock {
                syntax: "json".to_string(),
                code: "{}".to_string()
            }
        );
        assert_eq!(classify(&Node::Other), Block::Ignored);
    }
}
