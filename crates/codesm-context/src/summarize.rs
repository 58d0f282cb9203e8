//! Summarizes a run of messages into the text that replaces them during
//! compaction, preferring a cheap provider and falling back to a heuristic
//! digest when none is configured or the call fails.

use crate::format::{format_messages_for_summary, role_tag};
use codesm_core::{Message, StreamChunk};
use codesm_providers::Provider;
use futures::StreamExt;

pub const SUMMARY_SYSTEM_PROMPT: &str = "You are summarizing a coding assistant conversation so it can be continued later.

Your goal: Create a concise summary that preserves everything needed to continue the conversation seamlessly.

PRESERVE:
- Decisions made and their rationale
- Technical constraints or requirements discovered
- File names and paths mentioned or modified
- Commands run and their outcomes
- Errors encountered and their solutions (or pending solutions)
- TODOs and pending tasks
- Current plan or next steps
- Key context about the codebase or problem domain

DO NOT:
- Invent information not present in the conversation
- Include generic filler or pleasantries
- Repeat the same information multiple times

FORMAT:
- Use bullet points for clarity
- Be concise but complete
- Group related items together
- Focus on what would help continue the conversation effectively";

const FALLBACK_PREVIEW_CHARS: usize = 100;
const FALLBACK_MESSAGE_CAP: usize = 20;

/// Non-LLM digest, used when no summarization provider is available or the
/// provider call fails. Walks the first 20 messages only.
pub fn fallback_summary(messages: &[Message]) -> String {
    let mut parts = vec!["Summary generation failed. Message overview:".to_string()];

    for (i, msg) in messages.iter().enumerate() {
        if i >= FALLBACK_MESSAGE_CAP {
            parts.push(format!("- ... and {} more messages", messages.len() - FALLBACK_MESSAGE_CAP));
            break;
        }

        let role = role_tag(msg.role);

        if !msg.tool_calls.is_empty() {
            let names: Vec<&str> = msg.tool_calls.iter().map(|tc| tc.name.as_str()).collect();
            parts.push(format!("- [{role}] Called: {}", names.join(", ")));
        } else if msg.role == codesm_core::Role::Tool {
            let tool_name = msg.attributes.get("tool_name").and_then(|v| v.as_str()).unwrap_or("unknown");
            parts.push(format!("- [tool:{tool_name}] (result)"));
        } else {
            let flattened = msg.content.replace('\n', " ");
            let preview: String = flattened.chars().take(FALLBACK_PREVIEW_CHARS).collect();
            if flattened.chars().count() > FALLBACK_PREVIEW_CHARS {
                parts.push(format!("- [{role}] {preview}..."));
            } else {
                parts.push(format!("- [{role}] {preview}"));
            }
        }
    }

    parts.join("\n")
}

async fn collect_text(provider: &dyn Provider, prompt: String) -> Option<String> {
    let messages = [Message::user(prompt)];
    let mut stream = provider.stream(SUMMARY_SYSTEM_PROMPT, &messages, None).await.ok()?;

    let mut result = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(StreamChunk::Text { text }) => result.push_str(&text),
            Ok(StreamChunk::Error { .. }) => return None,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    Some(result)
}

/// Summarizes `messages` for compaction. Returns `""` for an empty or
/// all-blank input. Tries `provider` if given; on any failure (or if none is
/// configured), falls back to [`fallback_summary`] so the caller always has
/// something to compact with.
pub async fn summarize_messages(provider: Option<&dyn Provider>, messages: &[Message]) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let formatted = format_messages_for_summary(messages);
    if formatted.trim().is_empty() {
        return String::new();
    }

    let Some(provider) = provider else {
        return fallback_summary(messages);
    };

    let prompt = format!("Summarize this conversation:\n\n{formatted}");
    match collect_text(provider, prompt).await {
        Some(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => {
            tracing::warn!("summarization provider returned no usable output, falling back");
            fallback_summary(messages)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesm_core::ToolCall;
    use serde_json::Value;

    #[tokio::test]
    async fn empty_messages_summarize_to_an_empty_string() {
        assert_eq!(summarize_messages(None, &[]).await, "");
    }

    #[tokio::test]
    async fn falls_back_to_the_heuristic_digest_without_a_provider() {
        let messages = vec![Message::user("what should I name this module?")];
        let summary = summarize_messages(None, &messages).await;
        assert!(summary.starts_with("Summary generation failed."));
        assert!(summary.contains("what should I name this module?"));
    }

    #[test]
    fn fallback_caps_the_message_walk_at_twenty() {
        let messages: Vec<Message> = (0..25).map(|i| Message::user(format!("msg {i}"))).collect();
        let summary = fallback_summary(&messages);
        assert!(summary.contains("... and 5 more messages"));
    }

    #[test]
    fn fallback_collapses_tool_calls_to_their_names() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![ToolCall { id: "1".into(), name: "grep".into(), arguments: Value::Null }],
        );
        let summary = fallback_summary(&[msg]);
        assert!(summary.contains("Called: grep"));
    }
}
