//! Holds every tool (built-in and MCP-discovered) the orchestrator can call.

use crate::context::{SharedTool, Tool, ToolContext, ToolError};
use codesm_core::ToolSchema;
use futures::future::join_all;
use std::collections::HashMap;

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, SharedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn add(&mut self, tool: SharedTool) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn definitions(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    pub fn find(&self, name: &str) -> Option<SharedTool> {
        self.tools.get(name).cloned()
    }

    pub fn remove(&mut self, name: &str) -> Option<SharedTool> {
        self.tools.remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Runs every `(id, name, args)` call concurrently. Ordering of the
    /// returned `(id, result-text)` pairs preserves input order; a failing
    /// or unknown tool becomes a prose string in its own slot rather than
    /// aborting the batch.
    pub async fn execute_parallel(
        &self,
        calls: &[(String, String, serde_json::Value)],
        context: &(dyn ToolContext + Sync),
    ) -> Vec<(String, String)> {
        let futures = calls.iter().map(|(id, name, args)| {
            let id = id.clone();
            let tool = self.find(name);
            let args = args.clone();
            let name = name.clone();
            async move {
                let text = match tool {
                    Some(tool) => match tool.call(args, context).await {
                        Ok(text) => text,
                        Err(err) => format!("Error: {err}"),
                    },
                    None => format!("Error: unknown tool '{name}'"),
                };
                (id, text)
            }
        });

        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AgentToolContext, CapabilityRequirement};
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn definition(&self) -> ToolSchema {
            ToolSchema::new("echo", "echoes its input", serde_json::json!({}))
        }

        fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
            &[]
        }

        async fn call(&self, args: serde_json::Value, _context: &dyn ToolContext) -> Result<String, ToolError> {
            Ok(args.to_string())
        }
    }

    #[tokio::test]
    async fn execute_parallel_preserves_input_order_and_isolates_failures() {
        let mut registry = ToolRegistry::new();
        registry.add(std::sync::Arc::new(EchoTool));

        let context = AgentToolContext::basic("s1".to_string(), None);
        let calls = vec![
            ("a".to_string(), "echo".to_string(), serde_json::json!(1)),
            ("b".to_string(), "missing".to_string(), serde_json::json!(2)),
            ("c".to_string(), "echo".to_string(), serde_json::json!(3)),
        ];

        let results = registry.execute_parallel(&calls, &context).await;
        assert_eq!(results[0].0, "a");
        assert_eq!(results[1].0, "b");
        assert!(results[1].1.starts_with("Error: unknown tool"));
        assert_eq!(results[2].0, "c");
    }
}
