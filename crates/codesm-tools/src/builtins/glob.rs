//! `glob`: gitignore-aware filename pattern matching.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use ::glob::Pattern;
use ignore::WalkBuilder;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

pub struct GlobTool;

impl GlobTool {
    pub fn new() -> Self {
        Self
    }

    fn glob_files(pattern: &str, root: &Path, limit: usize) -> Result<Vec<PathBuf>, ToolError> {
        let glob_pattern = Pattern::new(pattern).map_err(|e| ToolError::InvalidRequest(format!("invalid glob pattern: {e}")))?;

        let mut matches = Vec::new();

        for result in WalkBuilder::new(root).hidden(false).git_ignore(true).git_global(true).git_exclude(true).build() {
            let entry = result.map_err(|e| ToolError::ProviderError(format!("error walking directory: {e}")))?;
            let path = entry.path();

            if path.is_dir() {
                continue;
            }

            if let Ok(relative) = path.strip_prefix(root) {
                if glob_pattern.matches_path(relative) {
                    matches.push(path.to_path_buf());
                }
            }
        }

        matches.sort_by(|a, b| {
            let a_time = std::fs::metadata(a).and_then(|m| m.modified()).ok();
            let b_time = std::fs::metadata(b).and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });
        matches.truncate(limit);

        Ok(matches)
    }
}

impl Default for GlobTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Match filenames against a glob pattern (e.g. \"**/*.rs\"), honoring \
             .gitignore. Returns matching paths sorted by modification time, most \
             recent first.",
            json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Glob pattern to match against." },
                    "path": { "type": "string", "description": "Directory to search. Defaults to the working directory." },
                    "limit": { "type": "integer", "description": "Maximum number of results.", "default": 100, "minimum": 1 }
                },
                "required": ["pattern"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let pattern = args.get("pattern").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("pattern is required".to_string()))?.to_string();

        let root = if let Some(path_str) = args.get("path").and_then(Value::as_str) {
            context.resolve_path(path_str)?
        } else {
            context.cwd().ok_or_else(|| ToolError::InvalidRequest("no path specified and no working directory set".to_string()))?.to_path_buf()
        };

        let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(100) as usize;

        let matches = tokio::task::spawn_blocking(move || Self::glob_files(&pattern, &root, limit))
            .await
            .map_err(|e| ToolError::ProviderError(format!("glob task failed: {e}")))??;

        if matches.is_empty() {
            return Ok("No matches found".to_string());
        }

        let links: Vec<String> = matches.iter().map(|p| format!("[{}]({})", p.display(), p.display())).collect();
        Ok(links.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentToolContext;
    use tempfile::TempDir;

    #[tokio::test]
    async fn matches_nested_files_by_extension() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("test.rs"), "x").await.unwrap();
        tokio::fs::write(dir.path().join("test.txt"), "x").await.unwrap();
        tokio::fs::create_dir(dir.path().join("src")).await.unwrap();
        tokio::fs::write(dir.path().join("src/main.rs"), "x").await.unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = GlobTool::new().call(json!({ "pattern": "**/*.rs" }), &context).await.unwrap();
        assert!(result.contains("test.rs"));
        assert!(result.contains("main.rs"));
        assert!(!result.contains("test.txt"));
    }

    #[tokio::test]
    async fn limit_truncates_results() {
        let dir = TempDir::new().unwrap();
        for i in 0..10 {
            tokio::fs::write(dir.path().join(format!("test{i}.rs")), "x").await.unwrap();
        }
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = GlobTool::new().call(json!({ "pattern": "*.rs", "limit": 5 }), &context).await.unwrap();
        assert_eq!(result.lines().count(), 5);
    }

    #[tokio::test]
    async fn no_matches_reports_the_literal_message() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = GlobTool::new().call(json!({ "pattern": "*.nonexistent" }), &context).await.unwrap();
        assert_eq!(result, "No matches found");
    }
}
