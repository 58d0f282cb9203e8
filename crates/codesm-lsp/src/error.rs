use thiserror::Error;

#[derive(Debug, Error)]
pub enum LspError {
    #[error("language server executable not found: {0}")]
    ExecutableNotFound(String),
    #[error("failed to start language server: {0}")]
    Spawn(String),
    #[error("request '{method}' to server '{server}' timed out after {timeout_secs}s")]
    Timeout { server: String, method: String, timeout_secs: u64 },
    #[error("server '{0}' rejected initialize")]
    InitializeFailed(String),
    #[error("no language server handles this file")]
    NoServerForFile,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unknown server key: {0}")]
    UnknownServer(String),
}
