//! Interactive coding agent: ReAct loop, tool registry, MCP/LSP federation,
//! shadow snapshots, and subagents composed over one working tree.
//!
//! [`Agent`] is the facade every front end (the minimal HTTP server in
//! `main.rs`, `codesm-cli`) drives. It owns collaborator lifecycles; callers
//! only see `new_session`/`resume`/`chat`/`cleanup`.

pub mod agent;
pub mod config;
pub mod error;

pub use agent::Agent;
pub use config::AgentConfig;
pub use error::AgentError;
