//! `task`: runs a single subagent to completion and returns its final text.

use crate::context::{CapabilityRequirement, SubagentTaskSpec, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use serde_json::{json, Value};

const KNOWN_SUBAGENT_TYPES: &[&str] = &["coder", "researcher", "reviewer", "planner", "oracle", "finder", "librarian", "auto"];

pub struct TaskTool;

impl TaskTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TaskTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "task"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Spawn a subagent to handle a focused piece of work and return its final \
             answer. subagent_type narrows the subagent's tools, system prompt, and \
             model; use \"auto\" to let a router pick one.",
            json!({
                "type": "object",
                "properties": {
                    "subagent_type": { "type": "string", "enum": KNOWN_SUBAGENT_TYPES },
                    "prompt": { "type": "string", "description": "Task for the subagent to carry out." },
                    "description": { "type": "string", "description": "Short human-readable label for this task." }
                },
                "required": ["subagent_type", "prompt", "description"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let subagent_type = args.get("subagent_type").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("subagent_type is required".to_string()))?;

        if !KNOWN_SUBAGENT_TYPES.contains(&subagent_type) {
            return Err(ToolError::InvalidRequest(format!("unknown subagent type '{subagent_type}'")));
        }

        let prompt = args.get("prompt").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("prompt is required".to_string()))?;
        let description = args.get("description").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("description is required".to_string()))?;

        let runner = context.subagent_runner().ok_or_else(|| ToolError::InvalidRequest("no subagent runner configured for this session".to_string()))?;

        let spec = SubagentTaskSpec { subagent_type: subagent_type.to_string(), prompt: prompt.to_string(), description: description.to_string() };

        runner.run_task(&spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AgentToolContext, SubagentRunner, SubagentTaskResult};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct StubRunner;

    #[async_trait]
    impl SubagentRunner for StubRunner {
        async fn run_task(&self, spec: &SubagentTaskSpec) -> Result<String, ToolError> {
            Ok(format!("{}: done", spec.subagent_type))
        }

        async fn run_parallel(&self, _tasks: Vec<SubagentTaskSpec>, _fail_fast: bool) -> Vec<SubagentTaskResult> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn unknown_subagent_type_is_an_error() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = TaskTool::new()
            .call(json!({ "subagent_type": "wizard", "prompt": "do thing", "description": "thing" }), &context)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown subagent type"));
    }

    #[tokio::test]
    async fn errors_without_a_runner_configured() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = TaskTool::new()
            .call(json!({ "subagent_type": "coder", "prompt": "do thing", "description": "thing" }), &context)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no subagent runner"));
    }

    #[tokio::test]
    async fn delegates_to_the_injected_runner() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf())).with_subagent_runner(Arc::new(StubRunner));

        let out = TaskTool::new().call(json!({ "subagent_type": "coder", "prompt": "do thing", "description": "thing" }), &context).await.unwrap();
        assert_eq!(out, "coder: done");
    }
}
