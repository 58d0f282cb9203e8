//! Tool registry and built-in tools for the agent loop.

pub mod builtins;
pub mod context;
pub mod error;
pub mod registry;

pub use context::{
    AgentToolContext, CapabilityRequirement, CodeSearchHit, CodeSearchIndex, SubagentRunner, SubagentTaskResult, SubagentTaskSpec, Tool,
    ToolContext, UndoLog,
};
pub use error::ToolError;
pub use registry::ToolRegistry;
