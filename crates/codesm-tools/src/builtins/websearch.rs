//! `websearch`: runs a query against DuckDuckGo's HTML results page and
//! reduces the response the same way `webfetch` does.

use super::webfetch::reduce_html_to_text;
use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

pub struct WebSearchTool {
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder().user_agent("codesm-agent/0.1").build().expect("reqwest client");
        Self { client }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "websearch"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Run a web search query and return the result page reduced to plain \
             text, capped at roughly 50 KiB.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query." },
                    "timeout_ms": { "type": "integer", "description": "Request timeout in milliseconds.", "default": DEFAULT_TIMEOUT_MS }
                },
                "required": ["query"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[]
    }

    async fn call(&self, args: Value, _context: &dyn ToolContext) -> Result<String, ToolError> {
        let query = args.get("query").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("query is required".to_string()))?;
        let timeout_ms = args.get("timeout_ms").and_then(Value::as_u64).unwrap_or(DEFAULT_TIMEOUT_MS);

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[("q", query)])
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| ToolError::ProviderError(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ProviderError(format!("search request returned status {}", status.as_u16())));
        }

        let body = response.text().await.map_err(|e| ToolError::ProviderError(format!("read failed: {e}")))?;
        let (reduced, truncated) = reduce_html_to_text(&body, true);

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
    use crate::context::AgentToolContext;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_query_is_an_error() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = WebSearchTool::new().call(json!({}), &context).await.unwrap_err();
        assert!(err.to_string().contains("query is required"));
    }

    #[test]
    fn search_url_points_at_the_html_endpoint() {
        assert_eq!(SEARCH_URL, "https://html.duckduckgo.com/html/");
    }
}
