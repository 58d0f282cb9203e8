//! Top-level error type returned by facade operations that happen before a
//! stream starts (session lookup, provider resolution). Failures once a
//! stream is running surface as a terminal `StreamChunk::Error` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("session error: {0}")]
    Session(#[from] codesm_session::SessionStoreError),

    #[error("provider error: {0}")]
    Provider(#[from] codesm_providers::ProviderError),

    #[error("context window error: {0}")]
    Context(#[from] codesm_context::ContextError),

    #[error("session not found: {0}")]
    SessionNotFound(String),
}
