//! `read`: line-numbered file contents, optionally windowed.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use serde_json::{json, Value};

pub struct ReadTool;

impl ReadTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReadTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "read"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Read a file under the workspace. Returns content with 1-based line numbers \
             in the format '00001| content'. Supports reading the full file or a specific \
             line range via start_line/line_count.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file, relative to the working directory or absolute."
                    },
                    "start_line": {
                        "type": "integer",
                        "description": "Line number to start reading from (1-indexed, inclusive). Omit to read from the beginning.",
                        "minimum": 1
                    },
                    "line_count": {
                        "type": "integer",
                        "description": "Number of lines to read starting at start_line. Omit to read to end of file.",
                        "minimum": 1
                    }
                },
                "required": ["path"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidRequest("path is required".to_string()))?;
        let target = context.resolve_path(path)?;

        let content = tokio::fs::read_to_string(&target)
            .await
            .map_err(|e| ToolError::ProviderError(format!("read failed: {e}")))?;

        let start_line_arg = args.get("start_line").and_then(Value::as_u64).map(|v| v as usize);
        let line_count_arg = args.get("line_count").and_then(Value::as_u64).map(|v| v as usize);

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();

        let (start_idx, end_idx, actual_end) = match (start_line_arg, line_count_arg) {
            (None, None) => (0, total_lines, None),
            (Some(start), None) => {
                validate_start(start, total_lines)?;
                let start_idx = if total_lines == 0 { 0 } else { start - 1 };
                (start_idx, total_lines, Some(total_lines))
            }
            (Some(start), Some(count)) => {
                validate_start(start, total_lines)?;
                if count < 1 {
                    return Err(ToolError::InvalidRequest("line_count must be >= 1".to_string()));
                }
                let start_idx = if total_lines == 0 { 0 } else { start - 1 };
                let end_idx = (start_idx + count).min(total_lines);
                (start_idx, end_idx, Some(end_idx))
            }
            (None, Some(_)) => {
                return Err(ToolError::InvalidRequest("line_count requires start_line to be specified".to_string()));
            }
        };

        let mut output = String::from("<file>\n");
        for (idx, line) in lines.iter().enumerate().take(end_idx).skip(start_idx) {
            output.push_str(&format!("{:05}| {}\n", idx + 1, line));
        }

        match actual_end {
            Some(end) if end < total_lines => {
                output.push_str(&format!("\n(File has more lines. Use 'start_line' to read beyond line {end})\n"));
            }
            _ => output.push_str(&format!("\n(End of file - total {total_lines} lines)\n")),
        }
        output.push_str("</file>");

        Ok(output)
    }
}

fn validate_start(start: usize, total_lines: usize) -> Result<(), ToolError> {
    if start < 1 {
        return Err(ToolError::InvalidRequest("start_line must be >= 1".to_string()));
    }
    if total_lines > 0 && start > total_lines {
        return Err(ToolError::InvalidRequest(format!("start_line {start} exceeds file length {total_lines}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentToolContext;
    use tempfile::TempDir;

    async fn write_test_file(dir: &TempDir, name: &str, content: &str) {
        tokio::fs::write(dir.path().join(name), content).await.unwrap();
    }

    #[tokio::test]
    async fn reads_full_file_with_line_numbers() {
        let dir = TempDir::new().unwrap();
        write_test_file(&dir, "a.txt", "one\ntwo\nthree").await;
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = ReadTool::new().call(json!({ "path": "a.txt" }), &context).await.unwrap();
        assert!(result.contains("00001| one"));
        assert!(result.contains("00003| three"));
        assert!(result.contains("(End of file - total 3 lines)"));
    }

    #[tokio::test]
    async fn windowed_read_reports_more_lines() {
        let dir = TempDir::new().unwrap();
        write_test_file(&dir, "a.txt", "one\ntwo\nthree\nfour").await;
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = ReadTool::new()
            .call(json!({ "path": "a.txt", "start_line": 2, "line_count": 1 }), &context)
            .await
            .unwrap();
        assert!(result.contains("00002| two"));
        assert!(!result.contains("00001|"));
        assert!(result.contains("Use 'start_line' to read beyond line 2"));
    }

    #[tokio::test]
    async fn start_line_zero_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_test_file(&dir, "a.txt", "one").await;
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = ReadTool::new().call(json!({ "path": "a.txt", "start_line": 0 }), &context).await.unwrap_err();
        assert!(err.to_string().contains("start_line must be >= 1"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));
        assert!(ReadTool::new().call(json!({ "path": "missing.txt" }), &context).await.is_err());
    }
}
