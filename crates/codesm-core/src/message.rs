//! Neutral message model shared by sessions, providers, and the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Role of a message within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

/// A single requested tool invocation, attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One turn in a conversation.
///
/// Invariant: every `Role::Tool` message carries a `tool_call_id` that matches
/// a `ToolCall::id` emitted by a prior assistant message in the same turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Value>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content.into())
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, name: &str, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg.attributes
            .insert("tool_name".to_string(), Value::String(name.to_string()));
        msg
    }

    fn new(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
            attributes: HashMap::new(),
        }
    }

    /// An assistant message whose only content is a now-satisfied set of tool calls.
    pub fn is_tool_call_only(&self) -> bool {
        self.role == Role::Assistant && self.content.trim().is_empty() && !self.tool_calls.is_empty()
    }
}

/// Filters a session's raw message log down to what a provider should see:
/// tool-role messages and tool-call-only assistant messages are dropped, since
/// the orchestrator reconstructs tool turns fresh from the current request.
pub fn llm_visible(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| m.role != Role::Tool && !m.is_tool_call_only())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_visible_drops_tool_and_tool_call_only_messages() {
        let messages = vec![
            Message::user("hi"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall {
                    id: "1".into(),
                    name: "read".into(),
                    arguments: Value::Null,
                }],
            ),
            Message::tool_result("1", "read", "file contents"),
            Message::assistant("done"),
        ];
        let visible = llm_visible(&messages);
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].role, Role::User);
        assert_eq!(visible[1].content, "done");
    }

    #[test]
    fn assistant_with_text_and_tool_calls_is_not_tool_call_only() {
        let msg = Message::assistant_with_tool_calls(
            "let me check",
            vec![ToolCall {
                id: "1".into(),
                name: "read".into(),
                arguments: Value::Null,
            }],
        );
        assert!(!msg.is_tool_call_only());
    }
}
