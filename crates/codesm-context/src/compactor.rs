//! Compaction: decides when a message list has outgrown its window and
//! replaces the middle of it with a single summary message.

use crate::error::ContextError;
use crate::summarize::summarize_messages;
use crate::tokens::{estimate_tokens, should_compact};
use chrono::Utc;
use codesm_core::{Message, Role};
use codesm_providers::Provider;
use serde_json::Value;

const RECENT_MESSAGE_COUNT: usize = 20;
pub const DEFAULT_MAX_TOKENS: usize = 100_000;

/// Tracks a session's context window and compacts its message list once it
/// fills past 80%.
pub struct ContextManager {
    max_tokens: usize,
}

impl ContextManager {
    pub fn new(max_tokens: usize) -> Result<Self, ContextError> {
        if max_tokens == 0 {
            return Err(ContextError::InvalidWindow);
        }
        Ok(Self { max_tokens })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn estimate_tokens(&self, messages: &[Message]) -> usize {
        estimate_tokens(messages)
    }

    pub fn should_compact(&self, messages: &[Message]) -> bool {
        should_compact(messages, self.max_tokens)
    }

    /// Compacts `messages` if they've crossed the 80% threshold, otherwise
    /// returns them unchanged. System messages and the last
    /// [`RECENT_MESSAGE_COUNT`] messages are kept verbatim; everything else
    /// between them is collapsed into one summary message.
    pub async fn compact(&self, messages: &[Message], provider: Option<&dyn Provider>) -> Vec<Message> {
        if !self.should_compact(messages) {
            return messages.to_vec();
        }

        let recent_start = messages.len().saturating_sub(RECENT_MESSAGE_COUNT);
        let recent_set: std::collections::HashSet<usize> = (recent_start..messages.len()).collect();

        let to_summarize: Vec<Message> = messages
            .iter()
            .enumerate()
            .filter(|(i, m)| m.role != Role::System && !recent_set.contains(i))
            .map(|(_, m)| m.clone())
            .collect();

        let mut result: Vec<Message> = messages.iter().filter(|m| m.role == Role::System).cloned().collect();

        if !to_summarize.is_empty() {
            let summary_text = summarize_messages(provider, &to_summarize).await;
            if !summary_text.is_empty() {
                result.push(summary_message(&summary_text));
            }
        }

        for (i, m) in messages.iter().enumerate() {
            if recent_set.contains(&i) {
                result.push(m.clone());
            }
        }

        result
    }
}

fn summary_message(summary_text: &str) -> Message {
    let mut msg = Message::system(format!("## Previous Conversation Summary\n\n{summary_text}"));
    msg.attributes.insert("_context_summary".to_string(), Value::Bool(true));
    msg.attributes
        .insert("_summary_timestamp".to_string(), Value::String(Utc::now().to_rfc3339()));
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler_message(n: usize) -> Message {
        Message::user(format!("message number {n}: {}", "x".repeat(40)))
    }

    #[tokio::test]
    async fn leaves_small_conversations_untouched() {
        let manager = ContextManager::new(DEFAULT_MAX_TOKENS).unwrap();
        let messages = vec![Message::system("be helpful"), Message::user("hi")];
        let compacted = manager.compact(&messages, None).await;
        assert_eq!(compacted.len(), 2);
    }

    #[tokio::test]
    async fn compacts_and_preserves_system_and_recent_messages() {
        let manager = ContextManager::new(200).unwrap();
        let mut messages = vec![Message::system("be helpful")];
        messages.extend((0..40).map(filler_message));

        assert!(manager.should_compact(&messages));
        let compacted = manager.compact(&messages, None).await;

        assert_eq!(compacted[0].role, Role::System);
        assert!(!compacted[0].attributes.contains_key("_context_summary"));

        let summary = &compacted[1];
        assert_eq!(summary.role, Role::System);
        assert_eq!(summary.attributes.get("_context_summary"), Some(&Value::Bool(true)));
        assert!(summary.content.contains("Previous Conversation Summary"));

        let tail: Vec<&Message> = compacted.iter().skip(2).collect();
        assert_eq!(tail.len(), RECENT_MESSAGE_COUNT);
        assert_eq!(tail.last().unwrap().content, messages.last().unwrap().content);
    }

    #[test]
    fn rejects_a_zero_token_window() {
        assert!(ContextManager::new(0).is_err());
    }
}
