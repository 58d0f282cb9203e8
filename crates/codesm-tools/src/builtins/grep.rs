//! `grep`: ripgrep-engine content search capped to a fixed output budget.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use glob::Pattern;
use grep_regex::RegexMatcher;
use grep_searcher::sinks::Lossy;
use grep_searcher::Searcher;
use ignore::WalkBuilder;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;

const MAX_OUTPUT_BYTES: usize = 10 * 1024;

#[derive(Debug, Serialize)]
struct Match {
    file: String,
    line: u64,
    text: String,
}

pub struct GrepTool;

impl GrepTool {
    pub fn new() -> Self {
        Self
    }

    fn search(root: &Path, pattern: &str, glob: Option<String>, case_sensitive: bool) -> Result<Vec<Match>, String> {
        let regex_pattern = if case_sensitive { pattern.to_string() } else { format!("(?i){pattern}") };
        let matcher = RegexMatcher::new(&regex_pattern).map_err(|e| e.to_string())?;

        let include_pattern = glob.map(|p| Pattern::new(&p)).transpose().map_err(|e| e.to_string())?;

        let mut matches = Vec::new();
        let mut output_bytes = 0usize;

        'walk: for result in WalkBuilder::new(root).hidden(false).git_ignore(true).build() {
            let Ok(entry) = result else { continue };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            if let Some(ref pat) = include_pattern {
                if let Ok(relative) = path.strip_prefix(root) {
                    if !pat.matches_path(relative) {
                        continue;
                    }
                }
            }

            let path_display = path.display().to_string();
            let search_result = Searcher::new().search_path(
                &matcher,
                path,
                Lossy(|lnum, line| {
                    let trimmed = line.trim_end();
                    output_bytes += trimmed.len() + path_display.len() + 16;
                    matches.push(Match { file: path_display.clone(), line: lnum, text: trimmed.to_string() });
                    Ok(output_bytes < MAX_OUTPUT_BYTES)
                }),
            );

            if search_result.is_err() {
                continue;
            }
            if output_bytes >= MAX_OUTPUT_BYTES {
                break 'walk;
            }
        }

        Ok(matches)
    }
}

impl Default for GrepTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Search file contents by regex, sandboxed to ignored-dir filtering via \
             .gitignore rules. Returns up to roughly 10 KiB of matching lines; returns \
             the literal text 'No matches found' when nothing matches.",
            json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Regex pattern to search for." },
                    "path": { "type": "string", "description": "Directory to search. Defaults to the working directory." },
                    "glob": { "type": "string", "description": "Glob filter on file path (e.g. \"*.rs\")." },
                    "case": { "type": "boolean", "description": "Case-sensitive match. Defaults to false.", "default": false }
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

        let root = args
            .get("path")
            .and_then(Value::as_str)
            .map(|s| context.resolve_path(s))
            .transpose()?
            .or_else(|| context.cwd().map(|p| p.to_path_buf()))
            .ok_or_else(|| ToolError::InvalidRequest("no working directory available".to_string()))?;

        let glob = args.get("glob").and_then(Value::as_str).map(|s| s.to_string());
        let case_sensitive = args.get("case").and_then(Value::as_bool).unwrap_or(false);

        let matches = tokio::task::spawn_blocking(move || Self::search(&root, &pattern, glob, case_sensitive))
            .await
            .map_err(|e| ToolError::ProviderError(format!("search task failed: {e}")))?
            .map_err(|e| ToolError::InvalidRequest(format!("invalid pattern: {e}")))?;

        if matches.is_empty() {
            return Ok("No matches found".to_string());
        }

        let mut output = String::new();
        for m in &matches {
            output.push_str(&format!("{}:{}:{}\n", m.file, m.line, m.text));
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
    async fn finds_matching_lines() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "hello world\nrust is great").await.unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = GrepTool::new().call(json!({ "pattern": "rust" }), &context).await.unwrap();
        assert!(result.contains("rust is great"));
    }

    #[tokio::test]
    async fn no_matches_reports_the_literal_message() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "hello world").await.unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = GrepTool::new().call(json!({ "pattern": "nonexistent" }), &context).await.unwrap();
        assert_eq!(result, "No matches found");
    }

    #[tokio::test]
    async fn glob_filters_by_extension() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "hello").await.unwrap();
        tokio::fs::write(dir.path().join("a.rs"), "hello").await.unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = GrepTool::new().call(json!({ "pattern": "hello", "glob": "*.rs" }), &context).await.unwrap();
        assert!(result.contains("a.rs"));
        assert!(!result.contains("a.txt"));
    }
}
