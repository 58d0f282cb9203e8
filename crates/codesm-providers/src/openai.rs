//! OpenAI-compatible chat-completions adapter. Used directly for
//! `openai/*` models and reused by the `router.rs` adapter, which only
//! changes the base URL and auth header.

use crate::error::ProviderError;
use crate::provider::{ChunkStream, Provider};
use crate::sse::parse_sse;
use async_trait::async_trait;
use codesm_core::{Message, Role, StreamChunk, ToolSchema};
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    extra_headers: Vec<(String, String)>,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            extra_headers: Vec::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((key.into(), value.into()));
        self
    }

    fn build_request_body(&self, system: &str, messages: &[Message], tools: Option<&[ToolSchema]>) -> Value {
        let mut wire_messages = Vec::new();
        if !system.is_empty() {
            wire_messages.push(json!({"role": "system", "content": system}));
        }
        for m in messages {
            if m.role == Role::System {
                continue;
            }
            wire_messages.push(to_openai_message(m));
        }

        let mut body = json!({
            "model": self.model,
            "stream": true,
            "messages": wire_messages,
        });
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(tools
                    .iter()
                    .map(|t| json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        },
                    }))
                    .collect::<Vec<_>>());
            }
        }
        body
    }
}

fn to_openai_message(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
            "content": msg.content,
        }),
        Role::Assistant if !msg.tool_calls.is_empty() => json!({
            "role": "assistant",
            "content": if msg.content.is_empty() { Value::Null } else { json!(msg.content) },
            "tool_calls": msg.tool_calls.iter().map(|c| json!({
                "id": c.id,
                "type": "function",
                "function": {
                    "name": c.name,
                    "arguments": serde_json::to_string(&c.arguments).unwrap_or_else(|_| "{}".into()),
                },
            })).collect::<Vec<_>>(),
        }),
        Role::Assistant => json!({"role": "assistant", "content": msg.content}),
        Role::User | Role::System => json!({"role": "user", "content": msg.content}),
    }
}

struct ToolCallBuilder {
    id: String,
    name: String,
    args_buf: String,
}

#[async_trait]
impl Provider for OpenAiProvider {
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

        let mut request = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json");
        for (key, value) in &self.extra_headers {
            request = request.header(key, value);
        }

        let response = request.json(&body).send().await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Auth("provider rejected the supplied API key".into()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Provider(format!("provider returned {status}: {text}")));
        }

        let events = parse_sse(response.bytes_stream());

        let stream = futures::stream::unfold(
            (
                Box::pin(events),
                HashMap::<usize, ToolCallBuilder>::new(),
                VecDeque::<StreamChunk>::new(),
            ),
            |(mut events, mut builders, mut pending)| async move {
                loop {
                    if let Some(chunk) = pending.pop_front() {
                        return Some((Ok(chunk), (events, builders, pending)));
                    }

                    let Some(event) = events.next().await else {
                        // Stream ended: flush any tool calls assembled across
                        // deltas that never got an explicit close signal.
                        for (_, builder) in builders.drain() {
                            let arguments = if builder.args_buf.trim().is_empty() {
                                json!({})
                            } else {
                                serde_json::from_str(&builder.args_buf).unwrap_or(json!({}))
                            };
                            pending.push_back(StreamChunk::ToolCall { id: builder.id, name: builder.name, arguments });
                        }
                        return pending.pop_front().map(|c| (Ok(c), (events, builders, pending)));
                    };

                    let value = match event {
                        Ok(v) => v,
                        Err(e) => {
                            return Some((
                                Err(ProviderError::ResponseFormat { message: e, raw_response: String::new() }),
                                (events, builders, pending),
                            ))
                        }
                    };

                    let Some(choice) = value.get("choices").and_then(|c| c.get(0)) else {
                        continue;
                    };
                    let delta = choice.get("delta").cloned().unwrap_or(Value::Null);

                    if let Some(text) = delta.get("content").and_then(Value::as_str) {
                        if !text.is_empty() {
                            pending.push_back(StreamChunk::Text { text: text.to_string() });
                        }
                    }

                    if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
                        for call in calls {
                            let index = call.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                            let id = call.get("id").and_then(Value::as_str).map(str::to_string);
                            let function = call.get("function").cloned().unwrap_or(Value::Null);
                            let name = function.get("name").and_then(Value::as_str).map(str::to_string);
                            let args_fragment = function.get("arguments").and_then(Value::as_str).unwrap_or("");

                            let builder = builders.entry(index).or_insert_with(|| ToolCallBuilder {
                                id: String::new(),
                                name: String::new(),
                                args_buf: String::new(),
                            });
                            if let Some(id) = id {
                                builder.id = id;
                            }
                            if let Some(name) = name {
                                builder.name = name;
                            }
                            builder.args_buf.push_str(args_fragment);
                            if !args_fragment.is_empty() {
                                pending.push_back(StreamChunk::ToolCallDelta {
                                    id: builder.id.clone(),
                                    partial_arguments: args_fragment.to_string(),
                                });
                            }
                        }
                    }

                    if pending.is_empty() {
                        continue;
                    }
                    return pending.pop_front().map(|c| (Ok(c), (events, builders, pending)));
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
    fn tool_result_maps_to_tool_role_message() {
        let msg = Message::tool_result("call_1", "read", "contents");
        let wire = to_openai_message(&msg);
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_1");
    }

    #[test]
    fn assistant_tool_calls_serialize_arguments_as_json_string() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![codesm_core::ToolCall {
                id: "call_1".into(),
                name: "read".into(),
                arguments: json!({"path": "a.rs"}),
            }],
        );
        let wire = to_openai_message(&msg);
        let args = wire["tool_calls"][0]["function"]["arguments"].as_str().unwrap();
        assert!(args.contains("a.rs"));
    }
}
