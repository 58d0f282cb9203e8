//! Unified error type surfaced by every tool's `call`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("provider error: {0}")]
    ProviderError(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("session error: {0}")]
    SessionError(String),
    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<codesm_permission::PermissionDenied> for ToolError {
    fn from(err: codesm_permission::PermissionDenied) -> Self {
        ToolError::PermissionDenied(err.to_string())
    }
}

impl From<codesm_snapshot::SnapshotError> for ToolError {
    fn from(err: codesm_snapshot::SnapshotError) -> Self {
        ToolError::ProviderError(err.to_string())
    }
}

impl From<codesm_lsp::LspError> for ToolError {
    fn from(err: codesm_lsp::LspError) -> Self {
        ToolError::ProviderError(err.to_string())
    }
}
