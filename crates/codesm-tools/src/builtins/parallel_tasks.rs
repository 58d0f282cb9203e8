//! `parallel_tasks`: runs up to 10 subagents concurrently and aggregates
//! their results with per-task timings.

use crate::context::{CapabilityRequirement, SubagentTaskSpec, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use serde::Deserialize;
use serde_json::{json, Value};

const MAX_PARALLEL_TASKS: usize = 10;

#[derive(Debug, Deserialize)]
struct TaskSpecArg {
    subagent_type: String,
    prompt: String,
    description: String,
}

pub struct ParallelTasksTool;

impl ParallelTasksTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ParallelTasksTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ParallelTasksTool {
    fn name(&self) -> &str {
        "parallel_tasks"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Run up to 10 subagent tasks concurrently and return their results with \
             per-task timings. Batches larger than 10 are truncated to the first 10. \
             When fail_fast is set, the first failing task signals the others to stop \
             through a shared cancellation flag rather than killing them outright.",
            json!({
                "type": "object",
                "properties": {
                    "tasks": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "subagent_type": { "type": "string" },
                                "prompt": { "type": "string" },
                                "description": { "type": "string" }
                            },
                            "required": ["subagent_type", "prompt", "description"]
                        }
                    },
                    "fail_fast": { "type": "boolean", "default": false }
                },
                "required": ["tasks"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let tasks_val = args.get("tasks").and_then(Value::as_array).ok_or_else(|| ToolError::InvalidRequest("tasks is required".to_string()))?;

        if tasks_val.is_empty() {
            return Err(ToolError::InvalidRequest("tasks must not be empty".to_string()));
        }

        let parsed: Vec<TaskSpecArg> = tasks_val
            .iter()
            .map(|v| serde_json::from_value(v.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ToolError::InvalidRequest(format!("invalid task spec: {e}")))?;

        let truncated = parsed.len() > MAX_PARALLEL_TASKS;
        let accepted: Vec<TaskSpecArg> = parsed.into_iter().take(MAX_PARALLEL_TASKS).collect();

        let fail_fast = args.get("fail_fast").and_then(Value::as_bool).unwrap_or(false);

        let runner = context.subagent_runner().ok_or_else(|| ToolError::InvalidRequest("no subagent runner configured for this session".to_string()))?;

        let specs: Vec<SubagentTaskSpec> =
            accepted.into_iter().map(|t| SubagentTaskSpec { subagent_type: t.subagent_type, prompt: t.prompt, description: t.description }).collect();

        let submitted = specs.len();
        let results = runner.run_parallel(specs, fail_fast).await;

        let result = json!({
            "results": results.iter().map(|r| json!({
                "description": r.description,
                "output": r.output,
                "duration_ms": r.duration_ms,
                "cancelled": r.cancelled,
            })).collect::<Vec<_>>(),
            "submitted": submitted,
            "truncated": truncated,
        });

        serde_json::to_string(&result).map_err(|e| ToolError::ProviderError(format!("serialize failed: {e}")))
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
            Ok(spec.description.clone())
        }

        async fn run_parallel(&self, tasks: Vec<SubagentTaskSpec>, _fail_fast: bool) -> Vec<SubagentTaskResult> {
            tasks.into_iter().map(|t| SubagentTaskResult { description: t.description, output: "ok".to_string(), duration_ms: 1, cancelled: false }).collect()
        }
    }

    fn task_arg(n: usize) -> Value {
        json!({ "subagent_type": "coder", "prompt": format!("task {n}"), "description": format!("task-{n}") })
    }

    #[tokio::test]
    async fn batches_over_the_cap_are_truncated_and_recorded() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf())).with_subagent_runner(Arc::new(StubRunner));

        let tasks: Vec<Value> = (0..15).map(task_arg).collect();
        let out = ParallelTasksTool::new().call(json!({ "tasks": tasks }), &context).await.unwrap();

        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["submitted"], 10);
        assert_eq!(parsed["truncated"], true);
        assert_eq!(parsed["results"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn a_full_batch_within_the_cap_is_not_marked_truncated() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf())).with_subagent_runner(Arc::new(StubRunner));

        let tasks: Vec<Value> = (0..3).map(task_arg).collect();
        let out = ParallelTasksTool::new().call(json!({ "tasks": tasks }), &context).await.unwrap();

        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["submitted"], 3);
        assert_eq!(parsed["truncated"], false);
    }

    #[tokio::test]
    async fn errors_without_a_runner_configured() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = ParallelTasksTool::new().call(json!({ "tasks": [task_arg(0)] }), &context).await.unwrap_err();
        assert!(err.to_string().contains("no subagent runner"));
    }
}
