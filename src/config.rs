//! Configuration for the mock server.
//!
//! Names the endpoint document, how it is served, and what to answer when a
//! documented route has no variant for the request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main configuration for the mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockServerConfig {
    /// Markdown document describing the endpoints
    #[serde(default = "default_source")]
    pub source: PathBuf,

    /// Re-read the document whenever it changes on disk
    #[serde(default)]
    pub live: bool,

    /// Address to listen on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Base URI requests for undocumented routes are forwarded to
    #[serde(default)]
    pub upstream: Option<String>,

    /// Response for documented routes with no matching variant
    #[serde(default)]
    pub fallback: FallbackResponse,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            live: false,
            listen: default_listen(),
            upstream: None,
            fallback: FallbackResponse::default(),
            settings: GlobalSettings::default(),
        }
    }
}

fn default_source() -> PathBuf {
    PathBuf::from("api.md")
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

impl MockServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        Ok(config)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.source.as_os_str().is_empty() {
            anyhow::bail!("Source document path cannot be empty");
        }
        self.fallback
            .validate()
            .map_err(|e| anyhow::anyhow!("Fallback: {}", e))?;
        if let Some(upstream) = &self.upstream {
            validate_upstream(upstream).map_err(|e| anyhow::anyhow!("Upstream: {}", e))?;
        }
        Ok(())
    }
}

fn validate_upstream(upstream: &str) -> anyhow::Result<()> {
    let uri: hyper::Uri = upstream
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid URI {}: {}", upstream, e))?;
    if uri.scheme_str() != Some("http") {
        anyhow::bail!("Only http:// upstreams are supported, got {}", upstream);
    }
    if uri.authority().is_none() {
        anyhow::bail!("Upstream {} has no host", upstream);
    }
    Ok(())
}

/// Response for a documented route whose variants all rejected the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackResponse {
    /// HTTP status code
    #[serde(default = "default_fallback_status")]
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Response body; objects and arrays are written as JSON
    #[serde(default = "default_fallback_body")]
    pub body: serde_json::Value,
}

impl Default for FallbackResponse {
    fn default() -> Self {
        Self {
            status: default_fallback_status(),
            headers: HashMap::new(),
            body: default_fallback_body(),
        }
    }
}

fn default_fallback_status() -> u16 {
    401
}

fn default_fallback_body() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl FallbackResponse {
    /// Validate the fallback response.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.status < 100 || self.status > 599 {
            anyhow::bail!("Invalid status code: {}", self.status);
        }
        Ok(())
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log all matched endpoints
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log requests no endpoint answered
    #[serde(default = "default_true")]
    pub log_unmatched: bool,

    /// Indentation of JSON response bodies (0 = compact)
    #[serde(default = "default_json_indent")]
    pub json_indent: usize,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
            json_indent: default_json_indent(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_json_indent() -> usize {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: MockServerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.source, PathBuf::from("api.md"));
        assert!(!config.live);
        assert_eq!(config.listen, "127.0.0.1:3000".parse().unwrap());
        assert!(config.upstream.is_none());
        assert_eq!(config.fallback.status, 401);
        assert!(config.fallback.headers.is_empty());
        assert_eq!(config.fallback.body, serde_json::json!({}));
        assert!(config.settings.log_matches);
        assert_eq!(config.settings.json_indent, 2);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
source: docs/api.md
live: true
listen: 0.0.0.0:8080
upstream: http://127.0.0.1:9000
fallback:
  status: 403
  headers:
    Content-Type: application/json
  body:
    error: forbidden
settings:
  log_matches: false
  json_indent: 0
"#;
        let config = MockServerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.source, PathBuf::from("docs/api.md"));
        assert!(config.live);
        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.upstream.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(config.fallback.status, 403);
        assert_eq!(
            config.fallback.headers.get("Content-Type"),
            Some(&"application/json".to_string())
        );
        assert_eq!(config.fallback.body["error"], "forbidden");
        assert!(!config.settings.log_matches);
        assert!(config.settings.log_unmatched);
        assert_eq!(config.settings.json_indent, 0);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(MockServerConfig::from_yaml("stubs: []").is_err());
        assert!(MockServerConfig::from_yaml("fallback:\n  code: 500\n").is_err());
    }

    #[test]
    fn test_invalid_fallback_status() {
        let err = MockServerConfig::from_yaml("fallback:\n  status: 42\n").unwrap_err();
        assert!(err.to_string().contains("Invalid status code"));
    }

    #[test]
    fn test_upstream_validation() {
        assert!(MockServerConfig::from_yaml("upstream: http://localhost:8080").is_ok());
        assert!(MockServerConfig::from_yaml("upstream: https://example.com").is_err());
        assert!(MockServerConfig::from_yaml("upstream: /relative").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apimd.yaml");
        std::fs::write(&path, "source: other.md\nlive: true\n").unwrap();

        let config = MockServerConfig::from_file(&path).unwrap();
        assert_eq!(config.source, PathBuf::from("other.md"));
        assert!(config.live);

        assert!(MockServerConfig::from_file(&dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_demo_config_matches_defaults() {
        let config = MockServerConfig::from_yaml(include_str!("../demos/apimd.yaml")).unwrap();
        let defaults = MockServerConfig::default();
        assert_eq!(config.source, defaults.source);
        assert_eq!(config.listen, defaults.listen);
        assert_eq!(config.fallback.status, defaults.fallback.status);
        assert_eq!(config.fallback.body, defaults.fallback.body);
        assert_eq!(config.settings.json_indent, defaults.settings.json_indent);
    }
}
