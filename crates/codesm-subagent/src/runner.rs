//! `SubagentRunner` implementation: narrows the parent tool registry per
//! subagent type, resolves the type's model alias, and drives the
//! orchestrator's ReAct loop to completion to get the subagent's final text.

use crate::config;
use crate::router::route_task;
use codesm_core::{Message, StreamChunk};
use codesm_providers::ProviderRegistry;
use codesm_tools::{AgentToolContext, SubagentRunner, SubagentTaskResult, SubagentTaskSpec, ToolContext, ToolError, ToolRegistry};
use futures::future::join_all;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Mirrors the original implementation's `MAX_PARALLEL_TASKS`: the hard cap
/// on concurrently running subagents, independent of how many tasks a batch
/// submits (`parallel_tasks` truncates the batch before it ever reaches here).
const MAX_PARALLEL_TASKS: usize = 10;

/// Default ReAct iteration cap for a subagent's own orchestrator loop.
/// Subagents are meant to finish a focused task, not run indefinitely.
const DEFAULT_MAX_ITERATIONS: usize = 25;

pub struct SubagentRunnerImpl {
    tools: Arc<ToolRegistry>,
    providers: Arc<ProviderRegistry>,
    cwd: Option<PathBuf>,
    max_iterations: usize,
}

impl SubagentRunnerImpl {
    pub fn new(tools: Arc<ToolRegistry>, providers: Arc<ProviderRegistry>, cwd: Option<PathBuf>) -> Self {
        Self { tools, providers, cwd, max_iterations: DEFAULT_MAX_ITERATIONS }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Copies the allowed subset of the parent registry's tools into a fresh
    /// registry. `task`/`parallel_tasks` are always excluded so a subagent can
    /// never spawn further subagents.
    fn narrow_registry(&self, allowed: Option<&[&str]>) -> ToolRegistry {
        let mut narrowed = ToolRegistry::new();
        for name in self.tools.names() {
            if name == "task" || name == "parallel_tasks" {
                continue;
            }
            if let Some(allowed) = allowed {
                if !allowed.contains(&name.as_str()) {
                    continue;
                }
            }
            if let Some(tool) = self.tools.find(&name) {
                narrowed.add(tool);
            }
        }
        narrowed
    }

    async fn run_one(&self, spec: &SubagentTaskSpec) -> Result<String, ToolError> {
        let subagent_type = if spec.subagent_type == "auto" {
            route_task(&self.providers, &spec.prompt).await.to_string()
        } else {
            spec.subagent_type.clone()
        };

        let config = config::find_config(&subagent_type)
            .ok_or_else(|| ToolError::InvalidRequest(format!("unknown subagent type '{subagent_type}'")))?;

        let provider = self.providers.resolve(config.model_alias).map_err(|e| ToolError::ProviderError(e.to_string()))?;

        let registry = Arc::new(self.narrow_registry(config.allowed_tools));
        let session_id = format!("subagent-{}", uuid::Uuid::new_v4());
        let context: Arc<dyn ToolContext> = Arc::new(AgentToolContext::basic(session_id, self.cwd.clone()));

        let mut stream = codesm_orchestrator::execute(
            provider,
            config.system_prompt.to_string(),
            vec![Message::user(spec.prompt.clone())],
            registry,
            context,
            self.max_iterations,
            CancellationToken::new(),
        );

        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                StreamChunk::Text { text } => output.push_str(&text),
                StreamChunk::Error { message } => return Err(ToolError::ProviderError(message)),
                StreamChunk::ToolCall { .. } | StreamChunk::ToolCallDelta { .. } | StreamChunk::ToolResult { .. } => {}
            }
        }

        Ok(output)
    }
}

#[async_trait::async_trait]
impl SubagentRunner for SubagentRunnerImpl {
    async fn run_task(&self, spec: &SubagentTaskSpec) -> Result<String, ToolError> {
        self.run_one(spec).await
    }

    /// Runs `tasks` behind a semaphore capped at `MAX_PARALLEL_TASKS`. When
    /// `fail_fast` is set, the first failing task flips a shared flag; tasks
    /// that have not yet started (including ones still waiting on the
    /// semaphore) short-circuit to a cancelled result instead of running.
    /// Already-running siblings are left to finish rather than aborted.
    async fn run_parallel(&self, tasks: Vec<SubagentTaskSpec>, fail_fast: bool) -> Vec<SubagentTaskResult> {
        let permits = MAX_PARALLEL_TASKS.min(tasks.len().max(1));
        let semaphore = Arc::new(Semaphore::new(permits));
        let cancelled = Arc::new(AtomicBool::new(false));

        let futures = tasks.into_iter().map(|spec| {
            let semaphore = Arc::clone(&semaphore);
            let cancelled = Arc::clone(&cancelled);
            async move {
                if cancelled.load(Ordering::SeqCst) {
                    return SubagentTaskResult { description: spec.description, output: "cancelled".to_string(), duration_ms: 0, cancelled: true };
                }

                let _permit = semaphore.acquire().await.expect("semaphore is never closed");

                if cancelled.load(Ordering::SeqCst) {
                    return SubagentTaskResult { description: spec.description, output: "cancelled".to_string(), duration_ms: 0, cancelled: true };
                }

                let start = Instant::now();
                let result = self.run_one(&spec).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                match result {
                    Ok(output) => SubagentTaskResult { description: spec.description, output, duration_ms, cancelled: false },
                    Err(err) => {
                        if fail_fast {
                            cancelled.store(true, Ordering::SeqCst);
                        }
                        SubagentTaskResult { description: spec.description, output: format!("Error: {err}"), duration_ms, cancelled: false }
                    }
                }
            }
        });

        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesm_core::ToolSchema;
    use codesm_tools::{CapabilityRequirement, Tool};
    use serde_json::Value;
    use tempfile::TempDir;

    struct NoopTool;

    #[async_trait::async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }

        fn definition(&self) -> ToolSchema {
            ToolSchema::new("noop", "does nothing", serde_json::json!({}))
        }

        fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
            &[]
        }

        async fn call(&self, _args: Value, _context: &dyn ToolContext) -> Result<String, ToolError> {
            Ok(String::new())
        }
    }

    fn runner() -> (SubagentRunnerImpl, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut tools = ToolRegistry::new();
        tools.add(Arc::new(NoopTool));
        let runner = SubagentRunnerImpl::new(Arc::new(tools), Arc::new(ProviderRegistry::new()), Some(dir.path().to_path_buf()));
        (runner, dir)
    }

    #[test]
    fn narrow_registry_always_drops_task_tools() {
        let (runner, _dir) = runner();
        let narrowed = runner.narrow_registry(None);
        assert!(narrowed.find("task").is_none());
        assert!(narrowed.find("parallel_tasks").is_none());
        assert!(narrowed.find("noop").is_some());
    }

    #[test]
    fn narrow_registry_respects_an_explicit_allowlist() {
        let (runner, _dir) = runner();
        let narrowed = runner.narrow_registry(Some(&[]));
        assert!(narrowed.find("noop").is_none());
    }

    #[tokio::test]
    async fn run_task_with_an_unknown_type_is_an_error() {
        let (runner, _dir) = runner();
        let spec = SubagentTaskSpec { subagent_type: "wizard".to_string(), prompt: "x".to_string(), description: "x".to_string() };
        let err = runner.run_task(&spec).await.unwrap_err();
        assert!(err.to_string().contains("unknown subagent type"));
    }

    #[tokio::test]
    async fn run_task_without_a_configured_provider_surfaces_as_provider_error() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        let (runner, _dir) = runner();
        let spec = SubagentTaskSpec { subagent_type: "coder".to_string(), prompt: "x".to_string(), description: "x".to_string() };
        let err = runner.run_task(&spec).await.unwrap_err();
        assert!(matches!(err, ToolError::ProviderError(_)));
    }

    #[tokio::test]
    async fn run_parallel_short_circuits_remaining_tasks_after_a_fail_fast_failure() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        let (runner, _dir) = runner();
        let tasks: Vec<SubagentTaskSpec> = (0..3)
            .map(|i| SubagentTaskSpec { subagent_type: "coder".to_string(), prompt: "x".to_string(), description: format!("t{i}") })
            .collect();

        let results = runner.run_parallel(tasks, true).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().any(|r| r.cancelled) || results.iter().all(|r| r.output.starts_with("Error:")));
    }
}
