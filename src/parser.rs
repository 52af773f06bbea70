//! Markdown-to-endpoint parser.
//!
//! Walks classified blocks in document order. A route heading opens a new
//! endpoint; field-group headings pick which slot the following code block
//! fills. When a field-group heading points at a slot that was already
//! filled, the endpoint under construction is finished and building continues
//! on a copy of it, so one route can document several alternative
//! request/response variants:
//!
//! ````markdown
//! ## GET /profile
//! ### If headers
//! ```json
//! {"Authorization": "Bearer admin"}
//! ```
//! ### Then body
//! ```json
//! {"role": "admin"}
//! ```
//! ### If headers
//! ```json
//! {"Authorization": "Bearer guest"}
//! ```
//! ### Then body
//! ```json
//! {"role": "guest"}
//! ```
//! ````

use crate::classify::{classify, Block, EndpointHeading, Field, FieldGroupHeading, Group, Slot};
use crate::decode::{decode_block, Content};
use crate::endpoint::{Endpoint, Endpoints, ResponseBody};
use crate::error::LoadError;
use crate::markdown::tokenize;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Parse a Markdown document into its endpoint collection.
pub fn parse(source: &str) -> Endpoints {
    let mut parser = Parser::new();
    for node in tokenize(source) {
        parser.feed(classify(&node));
    }
    parser.finish()
}

/// Read and parse a Markdown document from disk.
pub async fn load(path: &Path) -> Result<Endpoints, LoadError> {
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parse(&source))
}

/// Endpoint under construction.
struct Cursor {
    endpoint: Endpoint,
    /// Slot the next code block fills
    slot: Slot,
    /// Slots already filled by a code block
    written: HashSet<Slot>,
}

/// Incremental parser state. Idle while `cursor` is `None`.
#[derive(Default)]
pub struct Parser {
    endpoints: Endpoints,
    cursor: Option<Cursor>,
    routes: usize,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the state machine by one block.
    pub fn feed(&mut self, block: Block) {
        match block {
            Block::EndpointHeading(heading) => self.open_endpoint(heading),
            Block::FieldGroupHeading(heading) => self.select_field_group(heading),
            Block::CodeBlock { syntax, code } => self.fill(&syntax, &code),
            Block::Ignored => {}
        }
    }

    /// Finish the endpoint under construction and return the collection.
    pub fn finish(mut self) -> Endpoints {
        self.flush();
        debug!(
            endpoints = self.endpoints.len(),
            routes = self.routes,
            "Parsed endpoint document"
        );
        self.endpoints
    }

    fn open_endpoint(&mut self, heading: EndpointHeading) {
        self.flush();

        let mut endpoint = Endpoint::new(self.routes)
            .with_method(&heading.method)
            .with_url(heading.url);
        if let Some(status) = heading.status {
            endpoint.response.status = status;
        }
        if let Some(content_type) = &heading.content_type {
            endpoint.response.set_content_type(content_type);
        }
        self.routes += 1;

        self.cursor = Some(Cursor {
            endpoint,
            slot: Slot::RESPONSE_BODY,
            written: HashSet::new(),
        });
    }

    fn select_field_group(&mut self, heading: FieldGroupHeading) {
        let Some(cursor) = self.cursor.as_mut() else {
            return;
        };

        if cursor.written.contains(&heading.slot) {
            let next = cursor.endpoint.next_variant();
            let finished = std::mem::replace(&mut cursor.endpoint, next);
            debug!(
                route = finished.route,
                variant = finished.variant,
                "Slot rewritten, starting next variant"
            );
            self.endpoints.add(finished);
            cursor.written.clear();
        }

        cursor.slot = heading.slot;
        if let Some(status) = heading.status {
            cursor.endpoint.response.status = status;
        }
        if let Some(content_type) = &heading.content_type {
            cursor.endpoint.response.set_content_type(content_type);
        }
    }

    fn fill(&mut self, syntax: &str, code: &str) {
        let Some(cursor) = self.cursor.as_mut() else {
            return;
        };

        let content = decode_block(syntax, code);
        let endpoint = &mut cursor.endpoint;
        match (cursor.slot.group, cursor.slot.field) {
            (Group::Request, Field::Headers) => {
                endpoint.request.headers = content.into_headers();
            }
            (Group::Request, Field::Body) => {
                endpoint.request.body = Some(content.into_value());
            }
            (Group::Response, Field::Headers) => {
                let declared = content.into_headers();
                let keep_content_type = !declared
                    .keys()
                    .any(|name| name.eq_ignore_ascii_case("content-type"));
                let current = endpoint.response.content_type().map(str::to_string);
                endpoint.response.headers = declared;
                if let (true, Some(content_type)) = (keep_content_type, current) {
                    endpoint.response.set_content_type(&content_type);
                }
            }
            (Group::Response, Field::Body) => {
                endpoint.response.body = Some(match content {
                    Content::Template(source) => ResponseBody::Template(source),
                    Content::Value(value) => ResponseBody::Value(value),
                });
            }
        }
        cursor.written.insert(cursor.slot);
    }

    fn flush(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            self.endpoints.add(cursor.endpoint);
        }
    }
}
