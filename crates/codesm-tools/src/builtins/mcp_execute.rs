//! `mcp_execute`: runs a scripted batch of MCP calls through the sandbox bridge.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use codesm_mcp::Sandbox;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct McpExecuteTool;

impl McpExecuteTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for McpExecuteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for McpExecuteTool {
    fn name(&self) -> &str {
        "mcp_execute"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Run a short script that calls one or more MCP tools via mcp_call or \
             server.tool(**kwargs) helpers, and return its captured output. Assign \
             __result__ in the script to return a structured value.",
            json!({
                "type": "object",
                "properties": {
                    "code": { "type": "string", "description": "Script body to run in the sandbox." },
                    "timeout_secs": { "type": "integer", "description": "Timeout in seconds.", "default": DEFAULT_TIMEOUT_SECS }
                },
                "required": ["code"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let code = args.get("code").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("code is required".to_string()))?;
        let timeout_secs = args.get("timeout_secs").and_then(Value::as_u64).unwrap_or(DEFAULT_TIMEOUT_SECS);

        let manager = context.mcp_manager().ok_or_else(|| ToolError::InvalidRequest("no MCP manager configured for this session".to_string()))?;
        let workspace = context.cwd().ok_or_else(|| ToolError::InvalidRequest("no working directory available".to_string()))?;

        let sandbox = Sandbox::new(workspace, &manager).with_timeout(Duration::from_secs(timeout_secs));
        let execution = sandbox.execute(code).await;

        if !execution.success {
            return Err(ToolError::ProviderError(execution.error.unwrap_or_else(|| "sandbox script failed".to_string())));
        }

        let result = json!({
            "output": execution.output,
            "return_value": execution.return_value,
        });

        serde_json::to_string(&result).map_err(|e| ToolError::ProviderError(format!("serialize failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentToolContext;
    use codesm_mcp::McpManager;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn errors_without_an_mcp_manager_configured() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = McpExecuteTool::new().call(json!({ "code": "pass" }), &context).await.unwrap_err();
        assert!(err.to_string().contains("no MCP manager"));
    }

    #[tokio::test]
    async fn missing_code_is_an_error() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf())).with_mcp_manager(Arc::new(McpManager::new()));

        let err = McpExecuteTool::new().call(json!({}), &context).await.unwrap_err();
        assert!(err.to_string().contains("code is required"));
    }
}
