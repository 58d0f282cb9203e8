//! `webfetch`: HTTP GET with redirect-following and HTML-to-text reduction.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;

pub const MAX_REDUCED_BYTES: usize = 50 * 1024;
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<script.*?</script>|<style.*?</style>|<[^>]+>").unwrap())
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strips scripts, styles and tags, collapses whitespace, and caps the
/// result at `MAX_REDUCED_BYTES`. Applied whenever the response looks like
/// HTML; otherwise the body is returned as-is (still capped).
pub fn reduce_html_to_text(body: &str, is_html: bool) -> (String, bool) {
    let text = if is_html {
        let stripped = tag_pattern().replace_all(body, " ");
        whitespace_pattern().replace_all(&stripped, " ").trim().to_string()
    } else {
        body.to_string()
    };

    if text.len() > MAX_REDUCED_BYTES {
        let mut cut = MAX_REDUCED_BYTES;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        (text[..cut].to_string(), true)
    } else {
        (text, false)
    }
}

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder().user_agent("codesm-agent/0.1").build().expect("reqwest client");
        Self { client }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "webfetch"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Fetch a URL over HTTP (following redirects). HTML responses are reduced \
             to plain text and capped at roughly 50 KiB.",
            json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "URL to fetch." },
                    "timeout_ms": { "type": "integer", "description": "Request timeout in milliseconds.", "default": DEFAULT_TIMEOUT_MS }
                },
                "required": ["url"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[]
    }

    async fn call(&self, args: Value, _context: &dyn ToolContext) -> Result<String, ToolError> {
        let url = args.get("url").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("url is required".to_string()))?;
        let timeout_ms = args.get("timeout_ms").and_then(Value::as_u64).unwrap_or(DEFAULT_TIMEOUT_MS);

        let response = self.client.get(url).timeout(Duration::from_millis(timeout_ms)).send().await.map_err(|e| ToolError::ProviderError(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ProviderError(format!("request to {url} returned status {}", status.as_u16())));
        }

        let is_html = response.headers().get("content-type").and_then(|v| v.to_str().ok()).is_some_and(|ct| ct.contains("html"));

        let body = response.text().await.map_err(|e| ToolError::ProviderError(format!("read failed: {e}")))?;
        let (reduced, truncated) = reduce_html_to_text(&body, is_html);

        let result = json!({
            "status": status.as_u16(),
            "truncated": truncated,
            "body": reduced,
        });

        serde_json::to_string(&result).map_err(|e| ToolError::ProviderError(format!("serialize failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        let (text, truncated) = reduce_html_to_text("<html><body><h1>Hi</h1>\n\n<p>there</p></body></html>", true);
        assert_eq!(text, "Hi there");
        assert!(!truncated);
    }

    #[test]
    fn drops_script_and_style_blocks() {
        let (text, _) = reduce_html_to_text("<style>.a{color:red}</style><script>alert(1)</script><p>hi</p>", true);
        assert_eq!(text, "hi");
    }

    #[test]
    fn caps_output_at_the_byte_budget() {
        let body = "a".repeat(MAX_REDUCED_BYTES + 100);
        let (text, truncated) = reduce_html_to_text(&body, false);
        assert!(truncated);
        assert_eq!(text.len(), MAX_REDUCED_BYTES);
    }
}
