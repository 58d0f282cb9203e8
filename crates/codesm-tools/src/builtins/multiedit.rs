//! `multiedit`: applies several first-match substring replacements to one
//! file as a single atomic operation.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct EditOperation {
    old_content: String,
    new_content: String,
}

pub struct MultiEditTool;

impl MultiEditTool {
    pub fn new() -> Self {
        Self
    }

    /// Applies every edit in order against an in-memory buffer, failing the
    /// whole batch if any edit's `old_content` isn't found in the buffer as
    /// left by the edits before it.
    fn dry_run(initial: &str, edits: &[EditOperation]) -> Result<String, usize> {
        let mut buffer = initial.to_string();
        for (index, edit) in edits.iter().enumerate() {
            let Some(offset) = buffer.find(edit.old_content.as_str()) else {
                return Err(index);
            };
            let mut next = String::with_capacity(buffer.len() - edit.old_content.len() + edit.new_content.len());
            next.push_str(&buffer[..offset]);
            next.push_str(&edit.new_content);
            next.push_str(&buffer[offset + edit.old_content.len()..]);
            buffer = next;
        }
        Ok(buffer)
    }
}

impl Default for MultiEditTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for MultiEditTool {
    fn name(&self) -> &str {
        "multiedit"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Apply multiple first-match substring replacements to a single file, in \
             order. Every edit is validated against the buffer as left by the edits \
             before it before anything is written; if any edit's old_content would \
             not be found, the whole batch is rejected and the file is left unchanged.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File to edit." },
                    "edits": {
                        "type": "array",
                        "description": "Edits to apply in order.",
                        "items": {
                            "type": "object",
                            "properties": {
                                "old_content": { "type": "string" },
                                "new_content": { "type": "string" }
                            },
                            "required": ["old_content", "new_content"]
                        }
                    }
                },
                "required": ["path", "edits"]
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
        let edits_val = args.get("edits").and_then(Value::as_array).ok_or_else(|| ToolError::InvalidRequest("edits is required".to_string()))?;

        if edits_val.is_empty() {
            return Err(ToolError::InvalidRequest("edits must not be empty".to_string()));
        }

        let edits: Vec<EditOperation> = edits_val
            .iter()
            .map(|v| serde_json::from_value(v.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ToolError::InvalidRequest(format!("invalid edit operation: {e}")))?;

        let path = context.resolve_path(path_arg)?;
        let worktree = context.cwd().ok_or_else(|| ToolError::InvalidRequest("no working directory available".to_string()))?;

        let original = tokio::fs::read_to_string(&path).await.map_err(|e| ToolError::ProviderError(format!("read failed: {e}")))?;

        let updated = Self::dry_run(&original, &edits).map_err(|index| {
            ToolError::InvalidRequest(format!("Validation failed: old_content in edit #{index} not found after applying prior edits"))
        })?;

        let pre_hash = context.snapshot().and_then(|s| s.track(worktree).ok());
        if let (Some(log), Some(hash)) = (context.undo_log(), pre_hash.clone()) {
            log.record(path.clone(), hash).await;
        }

        tokio::fs::write(&path, &updated).await.map_err(|e| ToolError::ProviderError(format!("write failed: {e}")))?;

        let diff_summary = match (context.snapshot(), pre_hash) {
            (Some(snapshot), Some(hash)) => snapshot.diff_text(worktree, &hash).unwrap_or_default(),
            _ => String::new(),
        };

        let result = json!({
            "path": path.display().to_string(),
            "edits_applied": edits.len(),
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
    async fn applies_sequential_edits_in_order() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("f.txt"), "hello world").await.unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let args = json!({
            "path": "f.txt",
            "edits": [
                { "old_content": "hello", "new_content": "hi" },
                { "old_content": "hi world", "new_content": "hi rust" }
            ]
        });

        MultiEditTool::new().call(args, &context).await.unwrap();
        let updated = tokio::fs::read_to_string(dir.path().join("f.txt")).await.unwrap();
        assert_eq!(updated, "hi rust");
    }

    #[tokio::test]
    async fn batch_is_rejected_and_file_untouched_when_a_later_edit_cannot_apply() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("f.txt"), "hello world").await.unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let args = json!({
            "path": "f.txt",
            "edits": [
                { "old_content": "hello", "new_content": "hi" },
                { "old_content": "missing", "new_content": "x" }
            ]
        });

        let err = MultiEditTool::new().call(args, &context).await.unwrap_err();
        assert!(err.to_string().contains("Validation failed"));

        let untouched = tokio::fs::read_to_string(dir.path().join("f.txt")).await.unwrap();
        assert_eq!(untouched, "hello world");
    }
}
