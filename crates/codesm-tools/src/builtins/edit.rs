//! `edit`: single first-match substring replacement, bracketed by a snapshot.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use serde_json::{json, Value};

pub struct EditTool;

impl EditTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EditTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "edit"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Replace the first occurrence of old_content with new_content in a file. \
             old_content must match exactly and must appear at least once; old_content \
             and new_content must differ.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File to edit." },
                    "old_content": { "type": "string", "description": "Exact text to replace (first match only)." },
                    "new_content": { "type": "string", "description": "Replacement text." }
                },
                "required": ["path", "old_content", "new_content"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        if context.is_read_only() {
            return Err(ToolError::PermissionDenied("session is in read-only mode — edits are not allowed".to_string()));
        }

        let path_arg = args.get("path").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("path is required".to_string()))?;
        let old_content = args.get("old_content").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("old_content is required".to_string()))?;
        let new_content = args.get("new_content").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("new_content is required".to_string()))?;

        if old_content == new_content {
            return Err(ToolError::InvalidRequest("old_content and new_content are identical".to_string()));
        }

        let path = context.resolve_path(path_arg)?;
        let worktree = context.cwd().ok_or_else(|| ToolError::InvalidRequest("no working directory available".to_string()))?;

        let buffer = tokio::fs::read_to_string(&path).await.map_err(|e| ToolError::ProviderError(format!("read failed: {e}")))?;

        let Some(offset) = buffer.find(old_content) else {
            return Err(ToolError::InvalidRequest(format!("old_content not found in {}", path.display())));
        };

        let pre_hash = context.snapshot().and_then(|s| s.track(worktree).ok());
        if let (Some(log), Some(hash)) = (context.undo_log(), pre_hash.clone()) {
            log.record(path.clone(), hash).await;
        }

        let mut updated = String::with_capacity(buffer.len() - old_content.len() + new_content.len());
        updated.push_str(&buffer[..offset]);
        updated.push_str(new_content);
        updated.push_str(&buffer[offset + old_content.len()..]);

        tokio::fs::write(&path, &updated).await.map_err(|e| ToolError::ProviderError(format!("write failed: {e}")))?;

        let diff_summary = match (context.snapshot(), pre_hash) {
            (Some(snapshot), Some(hash)) => snapshot.diff_text(worktree, &hash).unwrap_or_default(),
            _ => String::new(),
        };

        let result = json!({
            "path": path.display().to_string(),
            "diff": diff_summary,
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
    async fn replaces_first_match_only() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("f.txt"), "foo bar foo").await.unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        EditTool::new().call(json!({ "path": "f.txt", "old_content": "foo", "new_content": "baz" }), &context).await.unwrap();

        let updated = tokio::fs::read_to_string(dir.path().join("f.txt")).await.unwrap();
        assert_eq!(updated, "baz bar foo");
    }

    #[tokio::test]
    async fn missing_old_content_is_an_error() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("f.txt"), "hello").await.unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = EditTool::new().call(json!({ "path": "f.txt", "old_content": "missing", "new_content": "x" }), &context).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn identical_replacement_is_rejected() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("f.txt"), "hello").await.unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = EditTool::new().call(json!({ "path": "f.txt", "old_content": "hello", "new_content": "hello" }), &context).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn edit_then_undo_round_trips() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("foo.txt"), "Hello, world!").await.unwrap();
        let shadow_base = TempDir::new().unwrap();
        let backend: std::sync::Arc<dyn codesm_snapshot::SnapshotBackend> =
            std::sync::Arc::new(codesm_snapshot::GitSnapshotBackend::with_snapshot_base(shadow_base.path().to_path_buf()));
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf())).with_snapshot(backend.clone());

        EditTool::new().call(json!({ "path": "foo.txt", "old_content": "world", "new_content": "Go" }), &context).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(dir.path().join("foo.txt")).await.unwrap(), "Hello, Go!");

        crate::builtins::undo::UndoTool::new().call(json!({ "path": "foo.txt" }), &context).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(dir.path().join("foo.txt")).await.unwrap(), "Hello, world!");
    }
}
