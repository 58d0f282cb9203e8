//! Wires every collaborator crate together behind `chat`/`new_session`/
//! `resume`/`cleanup`. One `Agent` owns one resolved working directory; the
//! session store is the only thing that outlives a single conversation.

use crate::config::AgentConfig;
use crate::error::AgentError;
use codesm_context::ContextManager;
use codesm_core::{Message, Session, StreamChunk};
use codesm_lsp::LspMultiplexer;
use codesm_mcp::McpManager;
use codesm_permission::Permission;
use codesm_providers::ProviderRegistry;
use codesm_session::{SessionStore, SqliteSessionStore};
use codesm_snapshot::{GitSnapshotBackend, SnapshotBackend};
use codesm_subagent::SubagentRunnerImpl;
use codesm_tools::{AgentToolContext, ToolContext, ToolRegistry};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Agent {
    cwd: PathBuf,
    model_alias: String,
    max_iterations: usize,
    sessions: Arc<dyn SessionStore>,
    providers: Arc<ProviderRegistry>,
    tools: Arc<ToolRegistry>,
    snapshot: Arc<dyn SnapshotBackend>,
    permission: Arc<Permission>,
    mcp_manager: Arc<McpManager>,
    lsp: Arc<LspMultiplexer>,
    context: Arc<ContextManager>,
    subagent_runner: Arc<dyn codesm_tools::SubagentRunner>,
}

impl Agent {
    /// Constructs every collaborator and, per config, connects MCP servers
    /// found by the descriptor search and starts LSP servers for the
    /// languages detected under `cwd`. Never fails on a missing MCP
    /// descriptor or an absent language server: both degrade to "none
    /// configured" rather than erroring agent construction.
    pub async fn new(config: AgentConfig) -> Result<Self, AgentError> {
        let sessions: Arc<dyn SessionStore> = match &config.db_path {
            Some(path) => Arc::new(SqliteSessionStore::connect(path.clone()).await?),
            None => Arc::new(SqliteSessionStore::connect_default().await?),
        };

        let providers = Arc::new(ProviderRegistry::new());
        let snapshot: Arc<dyn SnapshotBackend> = Arc::new(GitSnapshotBackend::new());
        let permission = Arc::new(Permission::new());
        let mcp_manager = Arc::new(McpManager::new());
        let lsp = Arc::new(LspMultiplexer::new(config.cwd.clone()));
        let context = Arc::new(ContextManager::new(config.max_context_tokens)?);

        let mut registry = ToolRegistry::new();
        for tool in codesm_tools::builtins::all_builtin_tools() {
            registry.add(tool);
        }
        let tools = Arc::new(registry);

        let subagent_runner = Arc::new(SubagentRunnerImpl::new(Arc::clone(&tools), Arc::clone(&providers), Some(config.cwd.clone())));

        if config.enable_mcp {
            if let Some(descriptor) = codesm_mcp::load_descriptor(&config.cwd).await {
                mcp_manager.connect_all(&descriptor).await;
            }
        }

        if config.enable_lsp {
            lsp.init_auto().await;
        }

        Ok(Self {
            cwd: config.cwd,
            model_alias: config.model_alias,
            max_iterations: config.max_iterations,
            sessions,
            providers,
            tools,
            snapshot,
            permission,
            mcp_manager,
            lsp,
            context,
            subagent_runner,
        })
    }

    pub async fn new_session(&self) -> Result<String, AgentError> {
        let session = self.sessions.create_session(self.cwd.clone()).await?;
        Ok(session.id)
    }

    pub async fn resume(&self, session_id: &str) -> Result<Session, AgentError> {
        self.sessions
            .get_session(session_id)
            .await?
            .ok_or_else(|| AgentError::SessionNotFound(session_id.to_string()))
    }

    fn tool_context(&self, session_id: &str) -> Arc<dyn ToolContext> {
        Arc::new(
            AgentToolContext::basic(session_id.to_string(), Some(self.cwd.clone()))
                .with_snapshot(Arc::clone(&self.snapshot))
                .with_lsp(Arc::clone(&self.lsp))
                .with_permission(Arc::clone(&self.permission))
                .with_mcp_manager(Arc::clone(&self.mcp_manager))
                .with_subagent_runner(Arc::clone(&self.subagent_runner)),
        )
    }

    /// Injects one user turn and streams the resulting `StreamChunk`s.
    /// Persists the user message immediately and the assistant's
    /// accumulated text once the orchestrator's stream ends; a mid-stream
    /// error is forwarded to the caller but not persisted as an assistant
    /// turn, matching the orchestrator's "no message, no commitment"
    /// contract.
    pub async fn chat(&self, session_id: &str, message: impl Into<String>) -> Result<BoxStream<'static, StreamChunk>, AgentError> {
        let message = message.into();
        let session = self.resume(session_id).await?;

        self.sessions.add_message(session_id, Message::user(message.clone())).await?;

        let provider = self.providers.resolve(&self.model_alias)?;
        let mut history = session.llm_visible_messages();
        history.push(Message::user(message));
        let history = self.context.compact(&history, Some(provider.as_ref())).await;

        let system_prompt = default_system_prompt(&self.cwd);
        let context = self.tool_context(session_id);

        let orchestrator_stream = codesm_orchestrator::execute(
            provider,
            system_prompt,
            history,
            Arc::clone(&self.tools),
            context,
            self.max_iterations,
            CancellationToken::new(),
        );

        let sessions = Arc::clone(&self.sessions);
        let session_id = session_id.to_string();
        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut orchestrator_stream = orchestrator_stream;
            let mut assistant_text = String::new();
            let mut saw_error = false;

            while let Some(chunk) = orchestrator_stream.next().await {
                if let StreamChunk::Text { text } = &chunk {
                    assistant_text.push_str(text);
                }
                if matches!(chunk, StreamChunk::Error { .. }) {
                    saw_error = true;
                }
                if tx.send(chunk).await.is_err() {
                    return;
                }
            }

            if !saw_error && !assistant_text.is_empty() {
                let _ = sessions.add_message(&session_id, Message::assistant(assistant_text)).await;
            }
        });

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx)))
    }

    /// Shuts down MCP and LSP child processes. Safe to call more than once.
    pub async fn cleanup(&self) {
        self.lsp.shutdown().await;
    }
}

fn default_system_prompt(cwd: &std::path::Path) -> String {
    format!(
        "You are codesm, an interactive coding agent working in {}. Use the available \
         tools to read, search, and modify the project; explain destructive actions \
         before taking them when the permission gate requires it.",
        cwd.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_agent() -> (Agent, TempDir) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("sessions.db");
        let config = AgentConfig::new(dir.path().to_path_buf()).with_db_path(db_path).without_mcp().without_lsp();
        (Agent::new(config).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn new_session_round_trips_through_resume() {
        let (agent, _dir) = test_agent().await;
        let id = agent.new_session().await.unwrap();
        let session = agent.resume(&id).await.unwrap();
        assert_eq!(session.id, id);
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn resume_of_an_unknown_session_is_an_error() {
        let (agent, _dir) = test_agent().await;
        let err = agent.resume("does-not-exist").await.unwrap_err();
        assert!(matches!(err, AgentError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn chat_without_a_configured_provider_surfaces_an_error_chunk() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        let (agent, _dir) = test_agent().await;
        let id = agent.new_session().await.unwrap();
        let err = agent.chat(&id, "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let (agent, _dir) = test_agent().await;
        agent.cleanup().await;
        agent.cleanup().await;
    }
}
