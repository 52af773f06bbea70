//! API Markdown Mock Server
//!
//! Serves HTTP mock responses straight from API documentation written in
//! Markdown. Headings name the routes, code blocks under them hold the
//! request fields to match and the responses to send.
//!
//! # Features
//!
//! - **Markdown Endpoints**: `## GET /users 200` opens a route, code blocks fill it
//! - **Request Matching**: Match by method, URL (literal or `~regex`), headers, body
//! - **Variants**: Several request/response pairs per route, first match wins
//! - **Dynamic Templates**: `hbs` code blocks are rendered with Handlebars
//! - **Live Reload**: Re-read the document when it changes on disk
//! - **Pass-through**: Forward undocumented routes to an upstream server
//!
//! # Example Document
//!
//! ````markdown
//! # POST /login
//!
//! ## Request body
//!
//! ```json
//! {"user": "admin", "password": "secret"}
//! ```
//!
//! ## Response body 200
//!
//! ```json
//! {"token": "abc"}
//! ```
//! ````
//!
//! ```
//! use apimd_mock_server::{parse, MockRequest};
//!
//! let endpoints = parse("# GET /ping\n\n```json\n{\"pong\": true}\n```\n");
//! let request = MockRequest::new().method("GET").url("/ping");
//! let endpoint = endpoints.find_by_request(&request).unwrap();
//! assert_eq!(endpoint.response.status, 200);
//! ```

pub mod classify;
pub mod config;
pub mod decode;
pub mod endpoint;
pub mod error;
pub mod markdown;
pub mod matcher;
pub mod parser;
pub mod passthrough;
pub mod server;
pub mod template;

pub use config::MockServerConfig;
pub use endpoint::{Endpoint, Endpoints, MockRequest};
pub use error::LoadError;
pub use parser::{load, parse};
pub use server::MockServer;
