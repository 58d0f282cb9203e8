//! `bash`: runs a command through the user's shell, combining its output
//! and gating destructive commands behind the permission gate.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::Command;

const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Flags output produced when the OS sandbox (Landlock/Seatbelt) blocks a
/// write while the session is read-only, so the agent knows to switch modes
/// rather than retry blindly.
fn detect_sandbox_denial(stderr: &str, exit_code: i32, is_read_only: bool) -> Option<String> {
    if !is_read_only || exit_code == 0 {
        return None;
    }
    let has_denial = stderr.contains("Operation not permitted") || stderr.contains("Permission denied");
    if has_denial {
        Some(
            "This command failed with a permission error while the session is in read-only \
             mode. The OS sandbox may have blocked a write operation. Switch to a writable \
             session if the command needs filesystem write access."
                .to_string(),
        )
    } else {
        None
    }
}

pub struct BashTool;

impl BashTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Run a command through the user shell and return its combined stdout/stderr. \
             Commands recognized as destructive (history-rewriting git operations, rm -rf, \
             sudo, and similar) require confirmation through the permission gate before \
             they run.",
            json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Command to run." },
                    "cwd": { "type": "string", "description": "Working directory override." },
                    "timeout": { "type": "integer", "description": "Timeout in milliseconds.", "default": DEFAULT_TIMEOUT_MS }
                },
                "required": ["command"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let command = args.get("command").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("command is required".to_string()))?;

        let cwd = args.get("cwd").and_then(Value::as_str).map(|s| context.resolve_path(s)).transpose()?;

        let timeout_ms = args.get("timeout").and_then(Value::as_u64).unwrap_or(DEFAULT_TIMEOUT_MS);

        if let Some(permission) = context.permission() {
            if let Some(classification) = codesm_permission::classify(command) {
                permission
                    .ask(
                        context.session_id(),
                        &classification.kind,
                        command,
                        &classification.reason,
                        &format!("About to run: {command}"),
                        Value::Null,
                    )
                    .await
                    .map_err(|denied| ToolError::PermissionDenied(format!("permission denied for {}", denied.request.title)))?;
            }
        }

        let mut cmd = if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-lc", command]);
            cmd
        };

        let dir = cwd.or_else(|| context.cwd().map(|p| p.to_path_buf())).ok_or_else(|| ToolError::InvalidRequest("no working directory available".to_string()))?;
        cmd.current_dir(dir);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        // The child is owned by `wait_handle` below; on timeout/cancellation we
        // abort that task rather than wait on it, so without this the child
        // would be dropped with no signal sent and keep running orphaned.
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| ToolError::ProviderError(format!("command failed to spawn: {e}")))?;

        let cancel = context.cancellation_token();

        let wait_handle = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let mut stdout_buf = Vec::new();
            let mut stderr_buf = Vec::new();
            let mut stdout = child.stdout.take();
            let mut stderr = child.stderr.take();
            let (_, _) = tokio::join!(
                async {
                    if let Some(ref mut s) = stdout {
                        let _ = s.read_to_end(&mut stdout_buf).await;
                    }
                },
                async {
                    if let Some(ref mut s) = stderr {
                        let _ = s.read_to_end(&mut stderr_buf).await;
                    }
                },
            );
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stdout_buf, stderr_buf))
        });

        tokio::pin!(wait_handle);

        let (status, stdout_buf, stderr_buf) = tokio::select! {
            result = &mut wait_handle => {
                result
                    .map_err(|e| ToolError::ProviderError(format!("task join failed: {e}")))?
                    .map_err(|e| ToolError::ProviderError(format!("command failed: {e}")))?
            }
            _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                wait_handle.abort();
                return Err(ToolError::ProviderError(format!("command timed out after {timeout_ms}ms")));
            }
            _ = cancel.cancelled() => {
                wait_handle.abort();
                return Err(ToolError::ProviderError("cancelled by user".to_string()));
            }
        };

        let stdout_str = String::from_utf8_lossy(&stdout_buf).to_string();
        let stderr_str = String::from_utf8_lossy(&stderr_buf).to_string();
        let exit_code = status.code().unwrap_or(-1);

        let mut combined = stdout_str.clone();
        if !stderr_str.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(&stderr_str);
        }
        if exit_code != 0 {
            combined.push_str(&format!("\n[exit code: {exit_code}]"));
        }

        let mut result = json!({
            "exit_code": exit_code,
            "stdout": stdout_str,
            "stderr": stderr_str,
            "output": combined,
        });

        if let Some(note) = detect_sandbox_denial(&stderr_str, exit_code, context.is_read_only()) {
            result["sandbox_note"] = Value::String(note);
        }

        serde_json::to_string(&result).map_err(|e| ToolError::ProviderError(format!("serialize failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentToolContext;
    use tempfile::TempDir;

    #[tokio::test]
    async fn runs_a_command_and_captures_stdout() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = BashTool::new().call(json!({ "command": "echo hello" }), &context).await.unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["exit_code"], 0);
        assert!(parsed["stdout"].as_str().unwrap().contains("hello"));
        assert!(parsed.get("sandbox_note").is_none());
    }

    #[tokio::test]
    async fn non_zero_exit_appends_exit_code_to_combined_output() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let result = BashTool::new().call(json!({ "command": "exit 3" }), &context).await.unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["exit_code"], 3);
        assert!(parsed["output"].as_str().unwrap().contains("[exit code: 3]"));
    }

    #[tokio::test]
    async fn dangerous_command_requires_permission_and_is_denied_without_a_responder() {
        let dir = TempDir::new().unwrap();
        let permission = std::sync::Arc::new(codesm_permission::Permission::new());
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf())).with_permission(permission.clone());

        let handle = tokio::spawn(async move { BashTool::new().call(json!({ "command": "rm -rf /tmp/should-not-run" }), &context).await });

        tokio::task::yield_now().await;
        let pending = permission.pending(Some("s1")).await;
        assert_eq!(pending.len(), 1);
        permission.respond("s1", &pending[0].id, codesm_permission::PermissionResponse::Deny).await;

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }

    #[test]
    fn sandbox_denial_only_flagged_read_only_and_nonzero() {
        assert!(detect_sandbox_denial("Permission denied", 1, false).is_none());
        assert!(detect_sandbox_denial("Permission denied", 0, true).is_none());
        assert!(detect_sandbox_denial("Operation not permitted", 1, true).is_some());
    }
}
