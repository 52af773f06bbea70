//! Handlers for requests no documented route accepts.

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, error};

/// Header added to every response relayed from the upstream.
pub const PROXIED_HEADER: &str = "x-apimd-proxied";

/// Receives requests for routes the endpoint document does not describe.
#[async_trait]
pub trait NextHandler: Send + Sync {
    async fn handle(&self, request: Request<Full<Bytes>>) -> Response<Full<Bytes>>;
}

/// Answers every request with 404.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

#[async_trait]
impl NextHandler for NotFound {
    async fn handle(&self, _request: Request<Full<Bytes>>) -> Response<Full<Bytes>> {
        error_response(404, "Not Found")
    }
}

/// HTTP client used for forwarding.
pub type HttpClient = Client<HttpConnector, Full<Bytes>>;

/// Forwards requests to an upstream server and relays its response.
pub struct Upstream {
    client: HttpClient,
    base: String,
}

impl Upstream {
    /// Forward to `base`, e.g. `http://127.0.0.1:8080`. The request path and
    /// query are appended to it.
    pub fn new(base: &str) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

#[async_trait]
impl NextHandler for Upstream {
    async fn handle(&self, request: Request<Full<Bytes>>) -> Response<Full<Bytes>> {
        let (parts, body) = request.into_parts();
        let upstream_path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let full_uri = format!("{}{}", self.base, upstream_path);

        debug!(method = %parts.method, uri = %full_uri, "Forwarding to upstream");

        let mut upstream_req = Request::builder().method(parts.method).uri(&full_uri);

        // Copy headers (skip host and framing)
        for (key, value) in parts.headers.iter() {
            if key != "host" && key != "transfer-encoding" && key != "connection" {
                upstream_req = upstream_req.header(key, value);
            }
        }

        let upstream_req = match upstream_req.body(body) {
            Ok(req) => req,
            Err(e) => {
                error!(uri = %full_uri, error = %e, "Failed to build upstream request");
                return error_response(502, "Bad Gateway");
            }
        };

        match self.client.request(upstream_req).await {
            Ok(upstream_response) => {
                let (parts, body) = upstream_response.into_parts();
                let body_bytes = match body.collect().await {
                    Ok(collected) => collected.to_bytes(),
                    Err(e) => {
                        error!(error = %e, "Failed to collect upstream response body");
                        return error_response(502, "Failed to read upstream response");
                    }
                };
                let mut response = Response::from_parts(parts, Full::new(body_bytes));
                response
                    .headers_mut()
                    .insert(PROXIED_HEADER, HeaderValue::from_static("true"));
                response
            }
            Err(e) => {
                error!(uri = %full_uri, error = %e, "Failed to forward request to upstream");
                error_response(502, "Bad Gateway")
            }
        }
    }
}

/// JSON error response: `{"error": "<message>"}`.
pub fn error_response(status: u16, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message }).to_string();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() =
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
