//! Shared error taxonomy kinds (spec §7). Each crate defines its own
//! `thiserror` enum; this type is the common surface the orchestrator and
//! tool registry render into prose for the LLM.

use std::fmt;

/// The five error kinds named in the error-handling design. Kept as data
/// (not a type hierarchy) so any crate's error can be classified at the
/// tool/orchestrator boundary without a blanket trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown tool, unknown subagent type, malformed arguments, missing file.
    UserInput,
    /// Provider non-2xx, LSP/MCP timeout, web fetch failure.
    ExternalService,
    /// Iteration cap, token window, bash/sandbox timeout, subagent cap.
    ResourceLimit,
    /// Declined diff preview or permission, multiedit validation failure.
    Integrity,
    /// JSON-RPC framing corruption, unrecoverable loss of child stdio.
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::UserInput => "user-input",
            ErrorKind::ExternalService => "external-service",
            ErrorKind::ResourceLimit => "resource-limit",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Fatal => "fatal",
        };
        write!(f, "{s}")
    }
}

/// Renders any error kind + message into the "Error: ..." prose convention
/// every tool result uses, per spec §7 propagation rule: the `chat` stream
/// never raises, every exception is caught at the nearest boundary.
pub fn render_error(kind: ErrorKind, message: impl fmt::Display) -> String {
    format!("Error: {message} ({kind})")
}
