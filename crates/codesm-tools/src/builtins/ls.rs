//! `ls`: renders a depth-capped directory tree with ignored-dir filtering.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use glob::Pattern;
use ignore::WalkBuilder;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAX_DEPTH: usize = 3;
const DEFAULT_LIMIT: usize = 100;

struct Entry {
    relative: PathBuf,
    is_dir: bool,
}

pub struct ListTool;

impl ListTool {
    pub fn new() -> Self {
        Self
    }

    fn default_ignores() -> Vec<&'static str> {
        vec![
            "node_modules/**",
            ".git/**",
            "dist/**",
            "build/**",
            "out/**",
            "target/**",
            ".next/**",
            ".nuxt/**",
            "vendor/**",
            "__pycache__/**",
            "*.pyc",
            ".venv/**",
            "venv/**",
            "coverage/**",
            ".cache/**",
            "tmp/**",
            "temp/**",
        ]
    }

    fn list_directory(root: &Path, ignore_patterns: Vec<String>, limit: usize) -> Result<(Vec<Entry>, bool), ToolError> {
        let ignore_pats: Result<Vec<Pattern>, _> = ignore_patterns.iter().map(|p| Pattern::new(p)).collect();
        let ignore_pats = ignore_pats.map_err(|e| ToolError::InvalidRequest(format!("invalid ignore pattern: {e}")))?;

        let mut entries = Vec::new();

        let walker = WalkBuilder::new(root).hidden(false).git_ignore(true).max_depth(Some(MAX_DEPTH)).build();

        for result in walker {
            if entries.len() >= limit {
                break;
            }

            let entry = result.map_err(|e| ToolError::ProviderError(format!("error walking directory: {e}")))?;
            let path = entry.path();

            if path == root {
                continue;
            }

            let Ok(relative) = path.strip_prefix(root) else { continue };
            if ignore_pats.iter().any(|pat| pat.matches_path(relative)) {
                continue;
            }

            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            entries.push(Entry { relative: relative.to_path_buf(), is_dir });
        }

        let truncated = entries.len() >= limit;
        Ok((entries, truncated))
    }
}

impl Default for ListTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ListTool {
    fn name(&self) -> &str {
        "ls"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "List files and directories as a tree, up to 3 levels deep, filtering \
             common build/vendor/ignore directories. The path must be absolute; omit \
             it to use the working directory.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory to list. Defaults to the working directory." },
                    "ignore": { "type": "array", "items": { "type": "string" }, "description": "Additional glob patterns to ignore." },
                    "limit": { "type": "integer", "description": "Maximum number of entries.", "default": DEFAULT_LIMIT, "minimum": 1 }
                },
                "required": []
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let root = if let Some(path_str) = args.get("path").and_then(Value::as_str) {
            context.resolve_path(path_str)?
        } else {
            context.cwd().ok_or_else(|| ToolError::InvalidRequest("no path specified and no working directory set".to_string()))?.to_path_buf()
        };

        if !root.is_dir() {
            return Err(ToolError::InvalidRequest(format!("{} is not a directory", root.display())));
        }

        let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(DEFAULT_LIMIT as u64) as usize;

        let mut ignore_patterns: Vec<String> = Self::default_ignores().into_iter().map(|s| s.to_string()).collect();
        if let Some(user_ignores) = args.get("ignore").and_then(Value::as_array) {
            ignore_patterns.extend(user_ignores.iter().filter_map(|v| v.as_str().map(|s| s.to_string())));
        }

        let (entries, truncated) = tokio::task::spawn_blocking(move || Self::list_directory(&root, ignore_patterns, limit))
            .await
            .map_err(|e| ToolError::ProviderError(format!("list task failed: {e}")))??;

        let mut output = String::new();
        for entry in &entries {
            let depth = entry.relative.components().count().saturating_sub(1);
            let name = entry.relative.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            output.push_str(&"  ".repeat(depth));
            output.push_str(&name);
            if entry.is_dir {
                output.push('/');
            }
            output.push('\n');
        }

        if truncated {
            output.push_str(&format!("\n[Results limited to {limit}. Narrow the path to see more.]"));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentToolContext;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lists_files_and_subdirectories() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("file1.txt"), "x").await.unwrap();
        tokio::fs::create_dir(dir.path().join("subdir")).await.unwrap();
        tokio::fs::write(dir.path().join("subdir/file2.txt"), "x").await.unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = ListTool::new().call(serde_json::json!({}), &context).await.unwrap();
        assert!(result.contains("file1.txt"));
        assert!(result.contains("subdir/"));
        assert!(result.contains("file2.txt"));
    }

    #[tokio::test]
    async fn ignore_patterns_filter_entries() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("keep.txt"), "x").await.unwrap();
        tokio::fs::write(dir.path().join("ignore.log"), "x").await.unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = ListTool::new().call(serde_json::json!({ "ignore": ["*.log"] }), &context).await.unwrap();
        assert!(result.contains("keep.txt"));
        assert!(!result.contains("ignore.log"));
    }

    #[tokio::test]
    async fn missing_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = ListTool::new().call(serde_json::json!({ "path": dir.path().join("nope").to_string_lossy() }), &context).await.unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
