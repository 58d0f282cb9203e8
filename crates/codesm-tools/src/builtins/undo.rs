//! `undo`: reverts a path to its last-recorded pre-edit snapshot.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use serde_json::{json, Value};

pub struct UndoTool;

impl UndoTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UndoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for UndoTool {
    fn name(&self) -> &str {
        "undo"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Revert a file to its last-recorded pre-edit snapshot. Only the most \
             recent write or edit to the path can be undone, and only once.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File to revert." }
                },
                "required": ["path"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        if context.is_read_only() {
            return Err(ToolError::PermissionDenied("session is in read-only mode — undo is not allowed".to_string()));
        }

        let path_arg = args.get("path").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("path is required".to_string()))?;
        let path = context.resolve_path(path_arg)?;
        let worktree = context.cwd().ok_or_else(|| ToolError::InvalidRequest("no working directory available".to_string()))?;

        let undo_log = context.undo_log().ok_or_else(|| ToolError::InvalidRequest("no recorded edit".to_string()))?;
        let snapshot = undo_log.take(&path).await.ok_or_else(|| ToolError::InvalidRequest("no recorded edit".to_string()))?;

        let backend = context.snapshot().ok_or_else(|| ToolError::InvalidRequest("no recorded edit".to_string()))?;

        let relative = path.strip_prefix(worktree).unwrap_or(&path).to_path_buf();
        let reverted = backend.revert_files(worktree, &[(snapshot, relative)])?;

        let result = json!({
            "path": path.display().to_string(),
            "reverted": reverted.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
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
    async fn undo_without_a_prior_edit_is_an_error() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = UndoTool::new().call(json!({ "path": "foo.txt" }), &context).await.unwrap_err();
        assert!(err.to_string().contains("no recorded edit"));
    }

    #[tokio::test]
    async fn undo_twice_in_a_row_fails_the_second_time() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("foo.txt"), "Hello, world!").await.unwrap();
        let shadow_base = TempDir::new().unwrap();
        let backend: std::sync::Arc<dyn codesm_snapshot::SnapshotBackend> =
            std::sync::Arc::new(codesm_snapshot::GitSnapshotBackend::with_snapshot_base(shadow_base.path().to_path_buf()));
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf())).with_snapshot(backend);

        crate::builtins::edit::EditTool::new()
            .call(json!({ "path": "foo.txt", "old_content": "world", "new_content": "Go" }), &context)
            .await
            .unwrap();

        UndoTool::new().call(json!({ "path": "foo.txt" }), &context).await.unwrap();
        let err = UndoTool::new().call(json!({ "path": "foo.txt" }), &context).await.unwrap_err();
        assert!(err.to_string().contains("no recorded edit"));
    }
}
