//! `codesearch`: delegates to an externally-injected semantic code index.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use serde_json::{json, Value};

const DEFAULT_TOP_K: u64 = 10;

pub struct CodeSearchTool;

impl CodeSearchTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CodeSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CodeSearchTool {
    fn name(&self) -> &str {
        "codesearch"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Search the codebase by meaning rather than exact text, using a semantic \
             index built ahead of time. Falls back to a plain error if no index is \
             available for this session.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Natural-language search query." },
                    "path": { "type": "string", "description": "Restrict results to this subtree." },
                    "file_pattern": { "type": "string", "description": "Glob restricting which files are considered." },
                    "top_k": { "type": "integer", "description": "Maximum number of results.", "default": DEFAULT_TOP_K, "minimum": 1 }
                },
                "required": ["query"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let Some(index) = context.code_search_index() else {
            return Err(ToolError::InvalidRequest("no semantic code index is available for this session".to_string()));
        };

        let query = args.get("query").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("query is required".to_string()))?;
        let path = args.get("path").and_then(Value::as_str);
        let file_pattern = args.get("file_pattern").and_then(Value::as_str);
        let top_k = args.get("top_k").and_then(Value::as_u64).unwrap_or(DEFAULT_TOP_K) as usize;

        let hits = index.query(query, path, file_pattern, top_k).await?;

        let result = json!({
            "hits": hits.iter().map(|h| json!({
                "path": h.path,
                "line": h.line,
                "snippet": h.snippet,
                "score": h.score,
            })).collect::<Vec<_>>(),
            "count": hits.len(),
        });

        serde_json::to_string(&result).map_err(|e| ToolError::ProviderError(format!("serialize failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AgentToolContext, CodeSearchHit, CodeSearchIndex};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct StubIndex;

    #[async_trait]
    impl CodeSearchIndex for StubIndex {
        async fn query(&self, query: &str, _path: Option<&str>, _file_pattern: Option<&str>, _top_k: usize) -> Result<Vec<CodeSearchHit>, ToolError> {
            Ok(vec![CodeSearchHit { path: "src/lib.rs".to_string(), line: 3, snippet: format!("fn matches_{query}()"), score: 0.9 }])
        }
    }

    #[tokio::test]
    async fn errors_without_an_index_configured() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = CodeSearchTool::new().call(json!({ "query": "parse tokens" }), &context).await.unwrap_err();
        assert!(err.to_string().contains("no semantic code index"));
    }

    #[tokio::test]
    async fn delegates_to_the_injected_index() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf())).with_code_search_index(Arc::new(StubIndex));

        let out = CodeSearchTool::new().call(json!({ "query": "tokens" }), &context).await.unwrap();
        assert!(out.contains("src/lib.rs"));
        assert!(out.contains("matches_tokens"));
    }
}
