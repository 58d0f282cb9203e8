//! Context window accounting and compaction.
//!
//! [`ContextManager`] estimates token usage with a cheap chars/4 heuristic
//! and, once a conversation crosses 80% of its configured window, replaces
//! everything but the system messages and the most recent turns with a
//! single summarized system message.

pub mod compactor;
pub mod error;
pub mod format;
pub mod summarize;
pub mod tokens;

pub use compactor::{ContextManager, DEFAULT_MAX_TOKENS};
pub use error::ContextError;
pub use format::format_messages_for_summary;
pub use summarize::{fallback_summary, summarize_messages, SUMMARY_SYSTEM_PROMPT};
pub use tokens::{estimate_tokens, should_compact};
