//! HTTP adapter serving the parsed endpoints.
//!
//! Each request is turned into a [`MockRequest`] and matched against the
//! current endpoint snapshot. A matching variant answers with its documented
//! response. A documented route with no matching variant answers with the
//! configured fallback. Anything else goes to the next handler.

use crate::config::MockServerConfig;
use crate::endpoint::{Endpoint, Endpoints, MockRequest, ResponseBody};
use crate::error::LoadError;
use crate::parser;
use crate::passthrough::{error_response, NextHandler, NotFound, Upstream};
use crate::template::{TemplateContext, TemplateEngine};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Mock server backed by a Markdown endpoint document.
pub struct MockServer {
    config: MockServerConfig,
    /// Current endpoint snapshot, replaced wholesale on reload
    endpoints: RwLock<Arc<Endpoints>>,
    /// Modification time of the source when it was last loaded
    loaded_at: Mutex<Option<SystemTime>>,
    template_engine: TemplateEngine,
    next: Box<dyn NextHandler>,
    /// Total requests processed.
    requests_total: AtomicU64,
    /// Requests answered by a documented variant.
    requests_matched: AtomicU64,
    /// Requests answered with the fallback response.
    requests_fallback: AtomicU64,
    /// Requests handed to the next handler.
    requests_passed: AtomicU64,
}

impl MockServer {
    /// Create a server with an empty endpoint snapshot. Call [`load`](Self::load)
    /// or [`replace_endpoints`](Self::replace_endpoints) to fill it.
    pub fn new(config: MockServerConfig) -> Self {
        let next: Box<dyn NextHandler> = match &config.upstream {
            Some(base) => Box::new(Upstream::new(base)),
            None => Box::new(NotFound),
        };

        info!(
            source = %config.source.display(),
            live = config.live,
            upstream = config.upstream.as_deref().unwrap_or("none"),
            "Mock server initialized"
        );

        Self {
            config,
            endpoints: RwLock::new(Arc::new(Endpoints::new())),
            loaded_at: Mutex::new(None),
            template_engine: TemplateEngine::new(),
            next,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_fallback: AtomicU64::new(0),
            requests_passed: AtomicU64::new(0),
        }
    }

    /// Replace the handler for unknown routes.
    pub fn with_next(mut self, next: impl NextHandler + 'static) -> Self {
        self.next = Box::new(next);
        self
    }

    pub fn config(&self) -> &MockServerConfig {
        &self.config
    }

    /// Get total requests processed.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get total requests matched.
    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    /// Get total requests answered with the fallback.
    pub fn total_fallback(&self) -> u64 {
        self.requests_fallback.load(Ordering::Relaxed)
    }

    /// Get total requests passed to the next handler.
    pub fn total_passed_through(&self) -> u64 {
        self.requests_passed.load(Ordering::Relaxed)
    }

    /// Current endpoint snapshot.
    pub async fn endpoints(&self) -> Arc<Endpoints> {
        Arc::clone(&*self.endpoints.read().await)
    }

    /// Swap in a new endpoint snapshot.
    pub async fn replace_endpoints(&self, endpoints: Endpoints) {
        *self.endpoints.write().await = Arc::new(endpoints);
    }

    /// Read and parse the source document, replacing the snapshot. Returns the
    /// number of endpoints loaded. On error the snapshot is left untouched.
    pub async fn load(&self) -> Result<usize, LoadError> {
        let path = self.config.source.as_path();
        let modified = source_modified(path).await?;
        let endpoints = parser::load(path).await?;
        let count = endpoints.len();

        info!(
            endpoints = count,
            routes = endpoints.routes(),
            path = %path.display(),
            "Loaded endpoint document"
        );

        self.replace_endpoints(endpoints).await;
        *self.loaded_at.lock().await = modified;
        Ok(count)
    }

    /// In live mode, reload the source if it changed since the last load.
    pub async fn refresh_if_changed(&self) {
        if !self.config.live {
            return;
        }

        let modified = match source_modified(&self.config.source).await {
            Ok(modified) => modified,
            Err(e) => {
                warn!(error = %e, "Keeping previous endpoints");
                return;
            }
        };
        {
            let loaded_at = self.loaded_at.lock().await;
            if loaded_at.is_some() && *loaded_at == modified {
                return;
            }
        }

        debug!(path = %self.config.source.display(), "Source changed, reloading");
        if let Err(e) = self.load().await {
            warn!(error = %e, "Reload failed, keeping previous endpoints");
        }
    }

    /// Answer `request` from the endpoint snapshot. `None` means the route is
    /// not documented and the request should go to the next handler.
    pub async fn respond(
        &self,
        request: &MockRequest,
        query: Option<&str>,
    ) -> Option<Response<Full<Bytes>>> {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let endpoints = self.endpoints().await;
        let method = request.method.as_deref().unwrap_or("");
        let url = request.url.as_deref().unwrap_or("");

        if let Some(endpoint) = endpoints.find_by_request(request) {
            self.requests_matched.fetch_add(1, Ordering::Relaxed);
            if self.config.settings.log_matches {
                info!(
                    method,
                    url,
                    route = endpoint.route,
                    variant = endpoint.variant,
                    status = endpoint.response.status,
                    "Request matched endpoint"
                );
            }
            return Some(self.endpoint_response(endpoint, request, query));
        }

        if endpoints.some_by_url(url) {
            self.requests_fallback.fetch_add(1, Ordering::Relaxed);
            if self.config.settings.log_unmatched {
                warn!(
                    method,
                    url,
                    status = self.config.fallback.status,
                    "No variant matched, sending fallback"
                );
            }
            let fallback = &self.config.fallback;
            let body = self.value_bytes(&fallback.body);
            return Some(build_response(fallback.status, &fallback.headers, body));
        }

        self.requests_passed.fetch_add(1, Ordering::Relaxed);
        if self.config.settings.log_unmatched {
            warn!(method, url, "Unknown route, passing through");
        }
        None
    }

    /// Handle one HTTP request.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        self.refresh_if_changed().await;

        let (parts, body) = req.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(error = %e, "Failed to read request body");
                return error_response(400, "Failed to read request body");
            }
        };

        let request = mock_request(&parts.method, &parts.uri, &parts.headers, &bytes);
        if let Some(response) = self.respond(&request, parts.uri.query()).await {
            return response;
        }

        self.next
            .handle(Request::from_parts(parts, Full::new(bytes)))
            .await
    }

    /// Bind the configured address and serve until the task is dropped.
    pub async fn serve(self: Arc<Self>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.listen).await?;
        self.serve_on(listener).await
    }

    /// Serve connections accepted from `listener`.
    pub async fn serve_on(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        info!("Mock server listening on http://{}", listener.local_addr()?);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = Arc::clone(&self);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { Ok::<_, Infallible>(server.handle(req).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Connection error: {}", e);
                }
            });
        }
    }

    /// Build the documented response of a matched endpoint.
    fn endpoint_response(
        &self,
        endpoint: &Endpoint,
        request: &MockRequest,
        query: Option<&str>,
    ) -> Response<Full<Bytes>> {
        let response = &endpoint.response;
        let body = match &response.body {
            None => Bytes::new(),
            Some(ResponseBody::Value(value)) => self.value_bytes(value),
            Some(ResponseBody::Template(template)) => {
                let ctx = TemplateContext::new(request, endpoint.request.url.as_ref(), query);
                match self.template_engine.render(template, &ctx) {
                    Ok(rendered) => Bytes::from(rendered),
                    Err(e) => {
                        warn!(route = endpoint.route, error = %e, "Template rendering failed");
                        return error_response(500, "Template rendering failed");
                    }
                }
            }
        };
        build_response(response.status, &response.headers, body)
    }

    /// Strings verbatim, objects and arrays as indented JSON, other scalars as
    /// their JSON text.
    fn value_bytes(&self, value: &serde_json::Value) -> Bytes {
        match value {
            serde_json::Value::String(text) => Bytes::from(text.clone()),
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                Bytes::from(to_json(value, self.config.settings.json_indent))
            }
            other => Bytes::from(other.to_string()),
        }
    }
}

async fn source_modified(path: &Path) -> Result<Option<SystemTime>, LoadError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(metadata.modified().ok())
}

fn to_json(value: &serde_json::Value, indent: usize) -> Vec<u8> {
    if indent == 0 {
        return serde_json::to_vec(value).unwrap_or_default();
    }
    let indent = " ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    match value.serialize(&mut serializer) {
        Ok(()) => out,
        Err(_) => serde_json::to_vec(value).unwrap_or_default(),
    }
}

fn build_response(
    status: u16,
    headers: &HashMap<String, String>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or_else(|_| {
        warn!(status, "Invalid status code, sending 500");
        StatusCode::INTERNAL_SERVER_ERROR
    });

    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid response header"),
        }
    }

    response
}

/// The matching engine's view of an HTTP request. The URL is the path without
/// the query string; repeated headers keep their first value.
fn mock_request(method: &Method, uri: &Uri, header_map: &HeaderMap, body: &Bytes) -> MockRequest {
    let mut headers = HashMap::new();
    for (name, value) in header_map.iter() {
        if let Ok(value) = value.to_str() {
            headers
                .entry(name.as_str().to_string())
                .or_insert_with(|| value.to_string());
        }
    }

    let body = if body.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(body).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(body).into_owned())
        }))
    };

    MockRequest {
        method: Some(method.as_str().to_string()),
        url: Some(uri.path().to_string()),
        headers,
        body,
    }
}
