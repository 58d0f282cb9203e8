//! Anthropic Messages API adapter: translates neutral messages/tools into
//! the vendor's wire format and decodes its content-block streaming events.

use crate::error::ProviderError;
use crate::provider::{ChunkStream, Provider};
use crate::sse::parse_sse;
use async_trait::async_trait;
use codesm_core::{Message, Role, StreamChunk, ToolSchema};
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request_body(&self, system: &str, messages: &[Message], tools: Option<&[ToolSchema]>) -> Value {
        let wire_messages: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(to_anthropic_message)
            .collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "stream": true,
            "messages": wire_messages,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(tools
                    .iter()
                    .map(|t| json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    }))
                    .collect::<Vec<_>>());
            }
        }
        body
    }
}

fn to_anthropic_message(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => json!({
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": msg.tool_call_id.clone().unwrap_or_default(),
                "content": msg.content,
            }],
        }),
        Role::Assistant if !msg.tool_calls.is_empty() => {
            let mut blocks = Vec::new();
            if !msg.content.trim().is_empty() {
                blocks.push(json!({"type": "text", "text": msg.content}));
            }
            for call in &msg.tool_calls {
                blocks.push(json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": call.arguments,
                }));
            }
            json!({"role": "assistant", "content": blocks})
        }
        Role::Assistant => json!({"role": "assistant", "content": msg.content}),
        Role::User | Role::System => json!({"role": "user", "content": msg.content}),
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
    ) -> Result<ChunkStream, ProviderError> {
        let body = self.build_request_body(system, messages, tools);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Auth("Anthropic API rejected the provided key".into()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Provider(format!("Anthropic returned {status}: {text}")));
        }

        let byte_stream = response.bytes_stream();
        let events = parse_sse(byte_stream);

        // Tracks, per content-block index, the tool's id/name (from
        // `content_block_start`) and its accumulated `partial_json` so the
        // full arguments can be parsed once the block closes.
        struct ToolBlock {
            id: String,
            name: String,
            json_buf: String,
        }

        let stream = futures::stream::unfold(
            (Box::pin(events), HashMap::<usize, ToolBlock>::new()),
            |(mut events, mut tool_blocks)| async move {
                loop {
                    let event = events.next().await?;
                    let value = match event {
                        Ok(v) => v,
                        Err(e) => {
                            return Some((
                                Err(ProviderError::ResponseFormat { message: e, raw_response: String::new() }),
                                (events, tool_blocks),
                            ))
                        }
                    };

                    let event_type = value.get("type").and_then(Value::as_str).unwrap_or("");
                    match event_type {
                        "content_block_start" => {
                            let index = value.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                            let block = value.get("content_block").cloned().unwrap_or(Value::Null);
                            if block.get("type").and_then(Value::as_str) == Some("tool_use") {
                                let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                                let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                                tool_blocks.insert(index, ToolBlock { id, name, json_buf: String::new() });
                            }
                        }
                        "content_block_delta" => {
                            let index = value.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                            let delta = value.get("delta").cloned().unwrap_or(Value::Null);
                            match delta.get("type").and_then(Value::as_str) {
                                Some("text_delta") => {
                                    let text = delta.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
                                    return Some((Ok(StreamChunk::Text { text }), (events, tool_blocks)));
                                }
                                Some("input_json_delta") => {
                                    let partial = delta
                                        .get("partial_json")
                                        .and_then(Value::as_str)
                                        .unwrap_or_default()
                                        .to_string();
                                    if let Some(block) = tool_blocks.get_mut(&index) {
                                        block.json_buf.push_str(&partial);
                                        let id = block.id.clone();
                                        return Some((
                                            Ok(StreamChunk::ToolCallDelta { id, partial_arguments: partial }),
                                            (events, tool_blocks),
                                        ));
                                    }
                                }
                                _ => {}
                            }
                        }
                        "content_block_stop" => {
                            let index = value.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                            if let Some(block) = tool_blocks.remove(&index) {
                                let arguments = if block.json_buf.trim().is_empty() {
                                    json!({})
                                } else {
                                    serde_json::from_str(&block.json_buf).unwrap_or(json!({}))
                                };
                                return Some((
                                    Ok(StreamChunk::ToolCall { id: block.id, name: block.name, arguments }),
                                    (events, tool_blocks),
                                ));
                            }
                        }
                        "error" => {
                            let message = value
                                .get("error")
                                .and_then(|e| e.get("message"))
                                .and_then(Value::as_str)
                                .unwrap_or("unknown Anthropic stream error")
                                .to_string();
                            return Some((Ok(StreamChunk::Error { message }), (events, tool_blocks)));
                        }
                        _ => {}
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesm_core::Message;

    #[test]
    fn tool_result_message_maps_to_user_tool_result_block() {
        let msg = Message::tool_result("call_1", "read", "file contents");
        let wire = to_anthropic_message(&msg);
        assert_eq!(wire["role"], "user");
        assert_eq!(wire["content"][0]["type"], "tool_result");
        assert_eq!(wire["content"][0]["tool_use_id"], "call_1");
    }

    #[test]
    fn assistant_with_tool_calls_includes_tool_use_blocks() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![codesm_core::ToolCall {
                id: "call_1".into(),
                name: "read".into(),
                arguments: json!({"path": "a.rs"}),
            }],
        );
        let wire = to_anthropic_message(&msg);
        assert_eq!(wire["content"][0]["type"], "tool_use");
        assert_eq!(wire["content"][0]["name"], "read");
    }
}
