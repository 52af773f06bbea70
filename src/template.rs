//! Template engine for dynamic responses.
//!
//! Response bodies fenced as `hbs` or `handlebars` are rendered per request
//! with Handlebars, using the request that matched as context.

use crate::endpoint::{MockRequest, UrlPattern};
use crate::matcher::parse_query_string;
use handlebars::Handlebars;
use serde::Serialize;
use std::collections::HashMap;

/// Template engine for rendering dynamic responses.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

/// Context for template rendering.
#[derive(Debug, Serialize)]
pub struct TemplateContext {
    /// Request method
    pub method: String,
    /// Request path
    pub url: String,
    /// Parsed query string
    pub query: HashMap<String, String>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Regex capture groups of the endpoint URL
    pub captures: HashMap<String, String>,
    /// Request body as text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Request body when it is structured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
}

impl TemplateContext {
    /// Build the context for `request`, matched by an endpoint with URL `pattern`.
    pub fn new(request: &MockRequest, pattern: Option<&UrlPattern>, query: Option<&str>) -> Self {
        let url = request.url.clone().unwrap_or_default();
        let captures = pattern
            .map(|pattern| pattern.captures(&url))
            .unwrap_or_default();
        let (body, json) = match &request.body {
            Some(serde_json::Value::String(text)) => (Some(text.clone()), None),
            Some(value) => (Some(value.to_string()), Some(value.clone())),
            None => (None, None),
        };

        Self {
            method: request.method.clone().unwrap_or_default(),
            url,
            query: parse_query_string(query.unwrap_or("")),
            headers: request.headers.clone(),
            captures,
            body,
            json,
        }
    }
}

impl TemplateEngine {
    /// Create a new template engine.
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();

        handlebars.register_helper("json", Box::new(json_helper));
        handlebars.register_helper("now", Box::new(now_helper));
        handlebars.register_helper("random", Box::new(random_helper));
        handlebars.register_helper("default", Box::new(default_helper));
        handlebars.register_helper("upper", Box::new(upper_helper));
        handlebars.register_helper("lower", Box::new(lower_helper));

        // Output is a response body, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }

    /// Render a template string with the given context.
    pub fn render(
        &self,
        template: &str,
        ctx: &TemplateContext,
    ) -> Result<String, handlebars::RenderError> {
        self.handlebars.render_template(template, ctx)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

// Custom Handlebars helpers

fn json_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let rendered = match h.param(0).map(|v| v.value()) {
        Some(serde_json::Value::String(s)) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(json) => serde_json::to_string_pretty(&json).unwrap_or_else(|_| s.clone()),
            Err(_) => s.clone(),
        },
        Some(value) => serde_json::to_string_pretty(value).unwrap_or_default(),
        None => String::new(),
    };
    out.write(&rendered)?;
    Ok(())
}

fn now_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    use chrono::Utc;

    let format = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .unwrap_or("%Y-%m-%dT%H:%M:%S%.3fZ");

    let now = Utc::now();
    out.write(&now.format(format).to_string())?;
    Ok(())
}

fn random_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    use rand::Rng;

    let min = h.param(0).and_then(|v| v.value().as_i64()).unwrap_or(0);
    let max = h.param(1).and_then(|v| v.value().as_i64()).unwrap_or(100);

    let mut rng = rand::thread_rng();
    let value = if max > min { rng.gen_range(min..=max) } else { min };
    out.write(&value.to_string())?;
    Ok(())
}

fn default_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = h.param(0).map(|v| v.value());
    let default = h.param(1).and_then(|v| v.value().as_str()).unwrap_or("");

    match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => out.write(s)?,
        Some(v) if !v.is_null() && !v.is_string() => out.write(&v.to_string())?,
        _ => out.write(default)?,
    }
    Ok(())
}

fn upper_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&value.to_uppercase())?;
    Ok(())
}

fn lower_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&value.to_lowercase())?;
    Ok(())
}
