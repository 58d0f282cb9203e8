//! `mcp_execute`: runs an LLM-written script in a subprocess, bridging MCP
//! tool calls between the script and the `McpManager` over stdio.
//!
//! Wire protocol (one line per frame, UTF-8, JSON payloads):
//! - script → sandbox: `<MCP_CALL_BEGIN>{"server":...,"tool":...,"args":...}<MCP_CALL_END>`
//! - sandbox → script: `<MCP_RESULT_BEGIN>{...}<MCP_RESULT_END>` or `<MCP_ERROR_BEGIN>...<MCP_ERROR_END>`
//! - script → sandbox, final: `<RESULT_BEGIN>{...}<RESULT_END>`

use crate::manager::McpManager;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

const CALL_BEGIN: &str = "<MCP_CALL_BEGIN>";
const CALL_END: &str = "<MCP_CALL_END>";
const RESULT_BEGIN: &str = "<MCP_RESULT_BEGIN>";
const RESULT_END: &str = "<MCP_RESULT_END>";
const ERROR_BEGIN: &str = "<MCP_ERROR_BEGIN>";
const ERROR_END: &str = "<MCP_ERROR_END>";
const FINAL_BEGIN: &str = "<RESULT_BEGIN>";
const FINAL_END: &str = "<RESULT_END>";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub return_value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct McpCallRequest {
    server: String,
    tool: String,
    args: Value,
}

pub struct Sandbox<'a> {
    pub workspace_dir: PathBuf,
    pub timeout: Duration,
    pub manager: &'a McpManager,
}

impl<'a> Sandbox<'a> {
    pub fn new(workspace_dir: impl Into<PathBuf>, manager: &'a McpManager) -> Self {
        Self { workspace_dir: workspace_dir.into(), timeout: Duration::from_secs(30), manager }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn execute(&self, code: &str) -> ExecutionResult {
        let script = build_script(code);
        let script_path = self.workspace_dir.join(format!(".codesm-sandbox-{}.py", uuid_like_suffix()));

        if let Err(e) = tokio::fs::write(&script_path, &script).await {
            return ExecutionResult { success: false, output: String::new(), error: Some(format!("failed to write sandbox script: {e}")), return_value: None };
        }

        let result = self.run_with_bridge(&script_path).await;
        let _ = tokio::fs::remove_file(&script_path).await;
        result
    }

    async fn run_with_bridge(&self, script_path: &Path) -> ExecutionResult {
        let mut child = match Command::new("python3")
            .arg(script_path)
            .current_dir(&self.workspace_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => return ExecutionResult { success: false, output: String::new(), error: Some(format!("failed to spawn sandbox: {e}")), return_value: None },
        };

        let mut stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let mut reader = BufReader::new(stdout).lines();

        let mut output_lines = Vec::new();
        let mut return_value = None;

        loop {
            let line = match tokio::time::timeout(self.timeout, reader.next_line()).await {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    let _ = child.kill().await;
                    return ExecutionResult { success: false, output: output_lines.join("\n"), error: Some(format!("reading sandbox stdout: {e}")), return_value: None };
                }
                Err(_) => {
                    let _ = child.kill().await;
                    return ExecutionResult { success: false, output: output_lines.join("\n"), error: Some("timeout".to_string()), return_value: None };
                }
            };

            if let Some(request_json) = extract_between(&line, CALL_BEGIN, CALL_END) {
                let response = self.handle_call(request_json).await;
                if stdin.write_all(response.as_bytes()).await.is_err() || stdin.write_all(b"\n").await.is_err() {
                    let _ = child.kill().await;
                    return ExecutionResult { success: false, output: output_lines.join("\n"), error: Some("sandbox stdin closed unexpectedly".to_string()), return_value: None };
                }
            } else if let Some(result_json) = extract_between(&line, FINAL_BEGIN, FINAL_END) {
                return_value = serde_json::from_str(result_json).ok();
            } else {
                output_lines.push(line);
            }
        }

        let stderr_text = match child.stderr.take() {
            Some(stderr) => {
                let mut buf = String::new();
                let mut reader = BufReader::new(stderr);
                let _ = tokio::io::AsyncReadExt::read_to_string(&mut reader, &mut buf).await;
                buf
            }
            None => String::new(),
        };

        let status = child.wait().await;
        let success = matches!(status, Ok(s) if s.success());
        let error = if stderr_text.trim().is_empty() { None } else { Some(stderr_text) };

        ExecutionResult { success, output: output_lines.join("\n"), error, return_value }
    }

    async fn handle_call(&self, request_json: &str) -> String {
        let request: McpCallRequest = match serde_json::from_str(request_json) {
            Ok(r) => r,
            Err(e) => return format!("{ERROR_BEGIN}malformed call request: {e}{ERROR_END}"),
        };

        match self.manager.call_tool(&request.server, &request.tool, request.args).await {
            Ok(result) => format!("{RESULT_BEGIN}{result}{RESULT_END}"),
            Err(e) => format!("{ERROR_BEGIN}{e}{ERROR_END}"),
        }
    }
}

fn extract_between<'a>(line: &'a str, begin: &str, end: &str) -> Option<&'a str> {
    let start = line.find(begin)? + begin.len();
    let stop = line[start..].find(end)? + start;
    Some(&line[start..stop])
}

fn uuid_like_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn build_script(user_code: &str) -> String {
    let indented: String = user_code.lines().map(|l| format!("        {l}\n")).collect();
    format!(
        r#"import sys
import json

def mcp_call(server, tool, **kwargs):
    request = json.dumps({{"server": server, "tool": tool, "args": kwargs}})
    print(f"{CALL_BEGIN}{{request}}{CALL_END}", flush=True)
    line = sys.stdin.readline().strip()
    if "{RESULT_BEGIN}" in line:
        start = line.index("{RESULT_BEGIN}") + len("{RESULT_BEGIN}")
        end = line.index("{RESULT_END}")
        raw = line[start:end]
        try:
            return json.loads(raw)
        except json.JSONDecodeError:
            return raw
    if "{ERROR_BEGIN}" in line:
        start = line.index("{ERROR_BEGIN}") + len("{ERROR_BEGIN}")
        end = line.index("{ERROR_END}")
        raise RuntimeError(line[start:end])
    return line

class McpServer:
    def __init__(self, name):
        self.name = name

    def __getattr__(self, tool):
        def call(**kwargs):
            return mcp_call(self.name, tool, **kwargs)
        return call

__result__ = None
try:
{indented}
except Exception as e:
    print(str(e), file=sys.stderr)
    sys.exit(1)

if __result__ is not None:
    print(f"{FINAL_BEGIN}{{json.dumps(__result__)}}{FINAL_END}")
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_payload_between_markers() {
        let line = format!("{CALL_BEGIN}{{\"a\":1}}{CALL_END}");
        assert_eq!(extract_between(&line, CALL_BEGIN, CALL_END), Some("{\"a\":1}"));
    }

    #[test]
    fn build_script_embeds_user_code_indented() {
        let script = build_script("x = 1 + 1");
        assert!(script.contains("        x = 1 + 1"));
        assert!(script.contains("mcp_call"));
    }
}
