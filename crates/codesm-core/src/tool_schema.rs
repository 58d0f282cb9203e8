//! Tool schema exposed to the LLM, and the stream-chunk union emitted by
//! providers and the orchestrator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool signature as advertised to the model: name, description, and a
/// JSON-Schema object describing its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Namespaces a tool name the way MCP-discovered tools must be exposed,
    /// to avoid collisions between servers and between servers and builtins.
    pub fn mcp_name(server: &str, tool: &str) -> String {
        format!("mcp_{server}_{tool}")
    }
}

/// A chunk of a provider's (or orchestrator's) streaming output.
///
/// Providers emit `Text`, `ToolCall`, and `ToolCallDelta`; the orchestrator
/// emits `ToolResult` once a dispatched tool call completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    Text { text: String },
    ToolCall { id: String, name: String, arguments: Value },
    ToolCallDelta { id: String, partial_arguments: String },
    ToolResult { id: String, name: String, content: String },
    /// A fatal, non-recoverable provider/transport error surfaced to the caller.
    Error { message: String },
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}
