//! The `Tool`/`ToolContext` seam every built-in and MCP-backed tool sits behind.

use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use codesm_lsp::LspMultiplexer;
use codesm_mcp::McpManager;
use codesm_permission::Permission;
use codesm_snapshot::{SnapshotBackend, SnapshotId};
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Per-session record of the last pre-mutation snapshot for each edited
/// path, so `undo` can find what to restore without the caller re-deriving
/// it from the full snapshot history.
#[derive(Default)]
pub struct UndoLog {
    last_snapshot: Mutex<HashMap<PathBuf, SnapshotId>>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, path: PathBuf, snapshot: SnapshotId) {
        self.last_snapshot.lock().await.insert(path, snapshot);
    }

    /// Removes and returns the recorded snapshot, so a second `undo` on the
    /// same path without an intervening edit reports "no recorded edit".
    pub async fn take(&self, path: &Path) -> Option<SnapshotId> {
        self.last_snapshot.lock().await.remove(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CapabilityRequirement {
    Filesystem,
}

/// One requested subagent invocation, as `task`/`parallel_tasks` build it.
#[derive(Debug, Clone)]
pub struct SubagentTaskSpec {
    pub subagent_type: String,
    pub prompt: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct SubagentTaskResult {
    pub description: String,
    pub output: String,
    pub duration_ms: u64,
    pub cancelled: bool,
}

/// Delegation seam between the tool layer and the subagent runtime, so
/// `codesm-tools` never depends on `codesm-subagent` directly — the
/// concrete runner is injected into a `ToolContext` by whatever composes
/// the two crates (the agent facade).
#[async_trait]
pub trait SubagentRunner: Send + Sync {
    async fn run_task(&self, spec: &SubagentTaskSpec) -> Result<String, ToolError>;

    async fn run_parallel(&self, tasks: Vec<SubagentTaskSpec>, fail_fast: bool) -> Vec<SubagentTaskResult>;
}

/// One hit from a `codesearch` query against the external semantic index.
#[derive(Debug, Clone)]
pub struct CodeSearchHit {
    pub path: String,
    pub line: u32,
    pub snippet: String,
    pub score: f32,
}

/// Delegation seam to an external semantic code index. `codesm-tools` has no
/// opinion on how the index is built or stored; whatever composes it into a
/// `ToolContext` owns that.
#[async_trait]
pub trait CodeSearchIndex: Send + Sync {
    async fn query(&self, query: &str, path: Option<&str>, file_pattern: Option<&str>, top_k: usize) -> Result<Vec<CodeSearchHit>, ToolError>;
}

/// Everything a tool's `call` needs besides its own arguments.
#[async_trait]
pub trait ToolContext: Send + Sync {
    fn session_id(&self) -> &str;

    fn cwd(&self) -> Option<&Path>;

    fn is_read_only(&self) -> bool {
        false
    }

    fn cancellation_token(&self) -> CancellationToken;

    /// Resolves `path` against `cwd`. Errors if `path` is relative and no cwd is set.
    fn resolve_path(&self, path: &str) -> Result<PathBuf, ToolError> {
        let path = Path::new(path);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            self.cwd()
                .map(|cwd| cwd.join(path))
                .ok_or_else(|| ToolError::InvalidRequest("cannot resolve relative path: no working directory set".into()))
        }
    }

    fn as_any(&self) -> &dyn Any;

    /// Shadow snapshot store, when the hosting agent has one wired up.
    fn snapshot(&self) -> Option<Arc<dyn SnapshotBackend>> {
        None
    }

    /// Per-path undo log, paired with `snapshot()`.
    fn undo_log(&self) -> Option<Arc<UndoLog>> {
        None
    }

    /// LSP multiplexer, for `diagnostics`/`lsp` and post-write refresh.
    fn lsp(&self) -> Option<Arc<LspMultiplexer>> {
        None
    }

    /// Permission gate, for tools that classify their own commands (`bash`).
    fn permission(&self) -> Option<Arc<Permission>> {
        None
    }

    /// MCP manager, for `mcp_execute` and MCP-discovered tool passthrough.
    fn mcp_manager(&self) -> Option<Arc<McpManager>> {
        None
    }

    /// Subagent delegation, for `task`/`parallel_tasks`.
    fn subagent_runner(&self) -> Option<Arc<dyn SubagentRunner>> {
        None
    }

    /// External semantic index, for `codesearch`.
    fn code_search_index(&self) -> Option<Arc<dyn CodeSearchIndex>> {
        None
    }

    /// Stdin/stdout fallback for front ends with no richer question channel.
    async fn ask_question(
        &self,
        _question_id: &str,
        question: &str,
        header: &str,
        options: &[(String, String)],
        multiple: bool,
    ) -> Result<Vec<String>, ToolError> {
        use std::io::{self, Write};

        println!("\n{}", header);
        println!("{question}\n");
        for (idx, (label, description)) in options.iter().enumerate() {
            println!("{}. {label} - {description}", idx + 1);
        }
        print!("{} ", if multiple { "choices (comma-separated):" } else { "choice:" });
        io::stdout().flush().map_err(|e| ToolError::Other(e.into()))?;

        let mut input = String::new();
        io::stdin().read_line(&mut input).map_err(|e| ToolError::Other(e.into()))?;

        let answers: Vec<String> = input
            .trim()
            .split(',')
            .filter_map(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0 && n <= options.len())
            .map(|n| options[n - 1].0.clone())
            .collect();

        if answers.is_empty() {
            Err(ToolError::InvalidRequest("no valid selections made".to_string()))
        } else {
            Ok(answers)
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> ToolSchema;

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[]
    }

    async fn call(&self, args: serde_json::Value, context: &dyn ToolContext) -> Result<String, ToolError>;

    async fn initialize(&self) -> Result<(), ToolError> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), ToolError> {
        Ok(())
    }
}

/// A plain filesystem-and-process-backed context: the shape every front end
/// (CLI, HTTP handler, subagent runner) constructs one of per turn.
#[derive(Default)]
pub struct AgentToolContext {
    session_id: String,
    cwd: Option<PathBuf>,
    read_only: bool,
    cancel: CancellationToken,
    snapshot: Option<Arc<dyn SnapshotBackend>>,
    undo_log: Option<Arc<UndoLog>>,
    lsp: Option<Arc<LspMultiplexer>>,
    permission: Option<Arc<Permission>>,
    mcp_manager: Option<Arc<McpManager>>,
    subagent_runner: Option<Arc<dyn SubagentRunner>>,
    code_search_index: Option<Arc<dyn CodeSearchIndex>>,
}

impl AgentToolContext {
    pub fn basic(session_id: String, cwd: Option<PathBuf>) -> Self {
        Self { session_id, cwd, cancel: CancellationToken::new(), ..Default::default() }
    }

    pub fn basic_read_only(session_id: String, cwd: Option<PathBuf>) -> Self {
        Self { session_id, cwd, read_only: true, cancel: CancellationToken::new(), ..Default::default() }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_snapshot(mut self, snapshot: Arc<dyn SnapshotBackend>) -> Self {
        self.snapshot = Some(snapshot);
        if self.undo_log.is_none() {
            self.undo_log = Some(Arc::new(UndoLog::new()));
        }
        self
    }

    pub fn with_undo_log(mut self, undo_log: Arc<UndoLog>) -> Self {
        self.undo_log = Some(undo_log);
        self
    }

    pub fn with_lsp(mut self, lsp: Arc<LspMultiplexer>) -> Self {
        self.lsp = Some(lsp);
        self
    }

    pub fn with_permission(mut self, permission: Arc<Permission>) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn with_mcp_manager(mut self, manager: Arc<McpManager>) -> Self {
        self.mcp_manager = Some(manager);
        self
    }

    pub fn with_subagent_runner(mut self, runner: Arc<dyn SubagentRunner>) -> Self {
        self.subagent_runner = Some(runner);
        self
    }

    pub fn with_code_search_index(mut self, index: Arc<dyn CodeSearchIndex>) -> Self {
        self.code_search_index = Some(index);
        self
    }
}

#[async_trait]
impl ToolContext for AgentToolContext {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn snapshot(&self) -> Option<Arc<dyn SnapshotBackend>> {
        self.snapshot.clone()
    }

    fn undo_log(&self) -> Option<Arc<UndoLog>> {
        self.undo_log.clone()
    }

    fn lsp(&self) -> Option<Arc<LspMultiplexer>> {
        self.lsp.clone()
    }

    fn permission(&self) -> Option<Arc<Permission>> {
        self.permission.clone()
    }

    fn mcp_manager(&self) -> Option<Arc<McpManager>> {
        self.mcp_manager.clone()
    }

    fn subagent_runner(&self) -> Option<Arc<dyn SubagentRunner>> {
        self.subagent_runner.clone()
    }

    fn code_search_index(&self) -> Option<Arc<dyn CodeSearchIndex>> {
        self.code_search_index.clone()
    }
}

pub type SharedTool = Arc<dyn Tool>;
