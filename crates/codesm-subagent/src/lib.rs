//! Typed subagent configs and the `SubagentRunner` implementation the
//! `task`/`parallel_tasks` tools delegate to: a subagent is the main agent
//! narrowed to a tool subset, a dedicated system prompt, and a task-tuned
//! model alias, run to completion through the same ReAct orchestrator.

pub mod config;
pub mod router;
pub mod runner;

pub use config::{find_config, known_types, SubagentConfig};
pub use router::route_task;
pub use runner::SubagentRunnerImpl;
