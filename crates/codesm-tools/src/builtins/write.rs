//! `write`: create/overwrite a file atomically, bracketed by a shadow snapshot.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use serde_json::{json, Value};

pub struct WriteTool;

impl WriteTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WriteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "write"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Create or overwrite a file with the given content, creating parent \
             directories as needed. Records a pre-write snapshot so the change can \
             be undone, and reports a diff summary of what changed.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path to write." },
                    "content": { "type": "string", "description": "Content to write." },
                    "create_dirs": {
                        "type": "boolean",
                        "description": "Create parent directories if missing.",
                        "default": true
                    }
                },
                "required": ["path", "content"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        if context.is_read_only() {
            return Err(ToolError::PermissionDenied("session is in read-only mode — file writes are not allowed".to_string()));
        }

        let path_arg = args.get("path").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("path is required".to_string()))?;
        let content = args.get("content").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("content is required".to_string()))?;
        let create_dirs = args.get("create_dirs").and_then(Value::as_bool).unwrap_or(true);

        let path = context.resolve_path(path_arg)?;
        let worktree = context.cwd().ok_or_else(|| ToolError::InvalidRequest("no working directory available".to_string()))?;

        let pre_hash = context.snapshot().and_then(|s| s.track(worktree).ok());
        if let (Some(log), Some(hash)) = (context.undo_log(), pre_hash.clone()) {
            log.record(path.clone(), hash).await;
        }

        if create_dirs {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| ToolError::ProviderError(format!("mkdir failed: {e}")))?;
            }
        }

        tokio::fs::write(&path, content).await.map_err(|e| ToolError::ProviderError(format!("write failed: {e}")))?;

        let diff_summary = match (context.snapshot(), pre_hash) {
            (Some(snapshot), Some(hash)) => snapshot.diff_text(worktree, &hash).unwrap_or_default(),
            _ => String::new(),
        };

        let path_str = path.to_string_lossy().to_string();
        let diagnostics = if let Some(lsp) = context.lsp() {
            lsp.touch_file(&path_str, true, std::time::Duration::from_millis(500)).await.unwrap_or_default()
        } else {
            Vec::new()
        };

        let result = json!({
            "path": path.display().to_string(),
            "bytes": content.len(),
            "diff": diff_summary,
            "diagnostics": diagnostics,
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
    async fn writes_file_and_creates_parents() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = WriteTool::new().call(json!({ "path": "sub/out.txt", "content": "hi" }), &context).await.unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["bytes"], 2);

        let written = tokio::fs::read_to_string(dir.path().join("sub/out.txt")).await.unwrap();
        assert_eq!(written, "hi");
    }

    #[tokio::test]
    async fn read_only_session_refuses_writes() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic_read_only("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = WriteTool::new().call(json!({ "path": "a.txt", "content": "x" }), &context).await.unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }
}
