//! Renders a message list into the compact text block fed to the
//! summarization provider (or kept for the fallback summary).

use codesm_core::{Message, Role};

const CONTENT_PREVIEW_CHARS: usize = 500;

fn truncate(content: &str) -> String {
    if content.chars().count() > CONTENT_PREVIEW_CHARS {
        let cut: String = content.chars().take(CONTENT_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        content.to_string()
    }
}

pub(crate) fn role_tag(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
        Role::System => "system",
    }
}

/// One line (or paragraph) per message: tool-call-bearing messages collapse
/// to the names of the tools called, tool-result messages get their own
/// `[tool:name]` tag, and everything else is `[role] content` with content
/// truncated at 500 characters.
pub fn format_messages_for_summary(messages: &[Message]) -> String {
    let mut parts = Vec::with_capacity(messages.len());

    for msg in messages {
        if !msg.tool_calls.is_empty() {
            let names: Vec<&str> = msg.tool_calls.iter().map(|tc| tc.name.as_str()).collect();
            parts.push(format!("[{}] Called tools: {}", role_tag(msg.role), names.join(", ")));
            continue;
        }

        if msg.role == Role::Tool {
            let tool_name = msg.attributes.get("tool_name").and_then(|v| v.as_str()).unwrap_or("unknown");
            parts.push(format!("[tool:{tool_name}] {}", truncate(&msg.content)));
            continue;
        }

        if !msg.content.is_empty() {
            parts.push(format!("[{}] {}", role_tag(msg.role), truncate(&msg.content)));
        }
    }

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesm_core::ToolCall;
    use serde_json::Value;

    #[test]
    fn renders_plain_messages_with_role_tags() {
        let messages = vec![Message::user("hello"), Message::assistant("hi there")];
        assert_eq!(format_messages_for_summary(&messages), "[user] hello\n\n[assistant] hi there");
    }

    #[test]
    fn collapses_tool_call_messages_to_their_names() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![ToolCall { id: "1".into(), name: "read".into(), arguments: Value::Null }],
        );
        assert_eq!(format_messages_for_summary(&[msg]), "[assistant] Called tools: read");
    }

    #[test]
    fn renders_tool_results_with_a_tool_tag() {
        let msg = Message::tool_result("1", "read", "file contents");
        assert_eq!(format_messages_for_summary(&[msg]), "[tool:read] file contents");
    }

    #[test]
    fn truncates_long_content_at_five_hundred_characters() {
        let long = "a".repeat(600);
        let msg = Message::user(long);
        let formatted = format_messages_for_summary(&[msg]);
        assert!(formatted.ends_with("..."));
        assert_eq!(formatted.len(), "[user] ".len() + 500 + 3);
    }

    #[test]
    fn skips_empty_content_messages() {
        let msg = Message::assistant("");
        assert_eq!(format_messages_for_summary(&[msg]), "");
    }
}
