//! `diagnostics`: opens a path on its LSP client and reports cached diagnostics.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use codesm_lsp::Severity;
use serde_json::{json, Value};
use std::time::Duration;

pub struct DiagnosticsTool;

impl DiagnosticsTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DiagnosticsTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for DiagnosticsTool {
    fn name(&self) -> &str {
        "diagnostics"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Open a file on its matching LSP client (if any is running) and report \
             diagnostics, optionally filtered to a minimum severity.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File to check. Omit to report every diagnostic cached across open files." },
                    "severity": { "type": "string", "enum": ["error", "warning", "all"], "description": "Minimum severity to include.", "default": "all" }
                },
                "required": []
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let Some(lsp) = context.lsp() else {
            return Err(ToolError::InvalidRequest("no LSP multiplexer configured for this session".to_string()));
        };

        let path_arg = args.get("path").and_then(Value::as_str);
        let severity = args.get("severity").and_then(Value::as_str).unwrap_or("all");

        let diagnostics = if let Some(path) = path_arg {
            let resolved = context.resolve_path(path)?;
            let path_str = resolved.to_string_lossy().to_string();
            lsp.touch_file(&path_str, true, Duration::from_millis(1000)).await?
        } else {
            lsp.diagnostics(None).await
        };

        let filtered: Vec<_> = diagnostics
            .into_iter()
            .filter(|d| match severity {
                "error" => matches!(d.severity, Severity::Error),
                "warning" => matches!(d.severity, Severity::Error | Severity::Warning),
                _ => true,
            })
            .collect();

        let result = json!({
            "diagnostics": filtered.iter().map(|d| json!({
                "path": d.path,
                "line": d.line,
                "column": d.column,
                "severity": d.severity.as_str(),
                "message": d.message,
                "source": d.source,
            })).collect::<Vec<_>>(),
            "count": filtered.len(),
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
    async fn errors_without_an_lsp_multiplexer() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = DiagnosticsTool::new().call(json!({}), &context).await.unwrap_err();
        assert!(err.to_string().contains("no LSP multiplexer"));
    }
}
