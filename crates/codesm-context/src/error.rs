//! Compaction never fails outward: a provider error just means the heuristic
//! fallback summary is used instead. This type exists for the one thing that
//! genuinely can't be recovered from inline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("max_tokens must be greater than zero")]
    InvalidWindow,
}
