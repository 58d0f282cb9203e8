//! Knobs the facade needs to wire its collaborators for one working directory.

use std::path::PathBuf;

/// Built once per process (or per test); `Agent::new` consumes it.
pub struct AgentConfig {
    pub cwd: PathBuf,
    /// Model alias or bare `<provider>/<model>` identifier for the main loop.
    pub model_alias: String,
    pub max_context_tokens: usize,
    /// `0` means unlimited, matching the orchestrator's own convention.
    pub max_iterations: usize,
    /// `None` uses the real SQLite-backed store at `db_path`; tests typically
    /// want `Some(InMemorySessionStore::new())`-equivalent behavior instead,
    /// which `AgentConfig::in_memory` sets up.
    pub db_path: Option<PathBuf>,
    /// Discover and connect configured MCP servers at startup.
    pub enable_mcp: bool,
    /// Auto-detect and start LSP servers for the languages found in `cwd`.
    pub enable_lsp: bool,
}

impl AgentConfig {
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            model_alias: "smart".to_string(),
            max_context_tokens: codesm_context::DEFAULT_MAX_TOKENS,
            max_iterations: 50,
            db_path: None,
            enable_mcp: true,
            enable_lsp: true,
        }
    }

    pub fn with_model_alias(mut self, alias: impl Into<String>) -> Self {
        self.model_alias = alias.into();
        self
    }

    pub fn with_db_path(mut self, path: PathBuf) -> Self {
        self.db_path = Some(path);
        self
    }

    pub fn without_mcp(mut self) -> Self {
        self.enable_mcp = false;
        self
    }

    pub fn without_lsp(mut self) -> Self {
        self.enable_lsp = false;
        self
    }
}
