use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("request to server '{server}' timed out after {timeout_secs}s")]
    Timeout { server: String, timeout_secs: u64 },
    #[error("unknown server: {0}")]
    UnknownServer(String),
    #[error("server '{0}' is unavailable (its client was torn down after a fatal error)")]
    Unavailable(String),
}
