//! Drives the interleaved reason/act loop: call the provider, forward text,
//! dispatch any tool calls it made, feed the results back, repeat.

use crate::accumulator::TurnAccumulator;
use codesm_core::{Message, StreamChunk};
use codesm_providers::Provider;
use codesm_tools::{ToolContext, ToolRegistry};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

const CHANNEL_CAPACITY: usize = 64;

pub type OrchestratorStream = BoxStream<'static, StreamChunk>;

/// Runs the ReAct loop and returns a stream of [`StreamChunk`]s. The
/// orchestrator never persists messages; the caller owns the session and is
/// responsible for storing the final assistant text once the stream ends.
///
/// `max_iterations == 0` means unlimited. Reaching the cap emits one final
/// text chunk announcing it and stops without making another provider call.
pub fn execute(
    provider: Arc<dyn Provider>,
    system_prompt: String,
    messages: Vec<Message>,
    tools: Arc<ToolRegistry>,
    context: Arc<dyn ToolContext>,
    max_iterations: usize,
    cancel: CancellationToken,
) -> OrchestratorStream {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(run_loop(provider, system_prompt, messages, tools, context, max_iterations, cancel, tx));

    Box::pin(ReceiverStream::new(rx))
}

async fn run_loop(
    provider: Arc<dyn Provider>,
    system_prompt: String,
    mut messages: Vec<Message>,
    tools: Arc<ToolRegistry>,
    context: Arc<dyn ToolContext>,
    max_iterations: usize,
    cancel: CancellationToken,
    tx: mpsc::Sender<StreamChunk>,
) {
    let mut iteration = 0usize;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        iteration += 1;
        if max_iterations != 0 && iteration > max_iterations {
            let _ = tx
                .send(StreamChunk::text(format!("Stopping: reached the {max_iterations}-iteration limit.")))
                .await;
            return;
        }

        let tool_defs = tools.definitions();
        let tool_defs = if tool_defs.is_empty() { None } else { Some(tool_defs.as_slice()) };

        let mut provider_stream = tokio::select! {
            _ = cancel.cancelled() => return,
            result = provider.stream(&system_prompt, &messages, tool_defs) => {
                match result {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = tx.send(StreamChunk::Error { message: err.to_string() }).await;
                        return;
                    }
                }
            }
        };

        let mut acc = TurnAccumulator::new();

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return,
                next = provider_stream.next() => next,
            };

            match next {
                None => break,
                Some(Ok(StreamChunk::Text { text })) => {
                    acc.push_text(&text);
                    if tx.send(StreamChunk::Text { text }).await.is_err() {
                        return;
                    }
                }
                Some(Ok(StreamChunk::ToolCall { id, name, arguments })) => {
                    acc.push_tool_call(id, name, arguments);
                }
                Some(Ok(StreamChunk::ToolCallDelta { id, partial_arguments })) => {
                    acc.push_tool_call_delta(id, None, &partial_arguments);
                }
                Some(Ok(StreamChunk::ToolResult { .. })) => {
                    // Providers don't emit these; only the orchestrator does.
                }
                Some(Ok(StreamChunk::Error { message })) => {
                    let _ = tx.send(StreamChunk::Error { message }).await;
                    return;
                }
                Some(Err(err)) => {
                    let _ = tx.send(StreamChunk::Error { message: err.to_string() }).await;
                    return;
                }
            }
        }

        let (text, tool_calls) = acc.finish();

        if tool_calls.is_empty() {
            return;
        }

        messages.push(Message::assistant_with_tool_calls(text, tool_calls.clone()));

        let calls: Vec<(String, String, Value)> = tool_calls.into_iter().map(|tc| (tc.id, tc.name, tc.arguments)).collect();

        let results = tokio::select! {
            _ = cancel.cancelled() => return,
            results = tools.execute_parallel(&calls, context.as_ref()) => results,
        };

        for ((id, name, _), (_, content)) in calls.iter().zip(results.iter()) {
            messages.push(Message::tool_result(id.clone(), name, content.clone()));
            if tx
                .send(StreamChunk::ToolResult { id: id.clone(), name: name.clone(), content: content.clone() })
                .await
                .is_err()
            {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesm_core::ToolSchema;
    use codesm_providers::{ChunkStream, ProviderError};
    use codesm_tools::{AgentToolContext, CapabilityRequirement, Tool, ToolError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct EchoTool;

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn definition(&self) -> ToolSchema {
            ToolSchema::new("echo", "echoes", serde_json::json!({}))
        }

        fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
            &[]
        }

        async fn call(&self, args: Value, _context: &dyn ToolContext) -> Result<String, ToolError> {
            Ok(args.to_string())
        }
    }

    /// Emits a tool call for "echo" on the first `stream` invocation, then a
    /// plain text reply with no tool calls on the second.
    struct ScriptedProvider {
        call_count: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn stream(&self, _system: &str, _messages: &[Message], _tools: Option<&[ToolSchema]>) -> Result<ChunkStream, ProviderError> {
            let n = self.call_count.fetch_add(1, Ordering::SeqCst);
            let chunks: Vec<Result<StreamChunk, ProviderError>> = if n == 0 {
                vec![
                    Ok(StreamChunk::text("let me check")),
                    Ok(StreamChunk::ToolCall { id: "1".to_string(), name: "echo".to_string(), arguments: serde_json::json!({"x": 1}) }),
                ]
            } else {
                vec![Ok(StreamChunk::text("done"))]
            };
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    #[tokio::test]
    async fn runs_a_tool_call_then_terminates_naturally() {
        let dir = TempDir::new().unwrap();
        let mut registry = ToolRegistry::new();
        registry.add(Arc::new(EchoTool));

        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider { call_count: AtomicUsize::new(0) });
        let context: Arc<dyn ToolContext> = Arc::new(AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf())));

        let mut stream = execute(provider, "be helpful".to_string(), vec![Message::user("hi")], Arc::new(registry), context, 0, CancellationToken::new());

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk);
        }

        assert!(matches!(&chunks[0], StreamChunk::Text { text } if text == "let me check"));
        assert!(matches!(&chunks[1], StreamChunk::ToolResult { name, .. } if name == "echo"));
        assert!(matches!(&chunks[2], StreamChunk::Text { text } if text == "done"));
    }

    #[tokio::test]
    async fn iteration_cap_stops_before_a_further_provider_call() {
        let dir = TempDir::new().unwrap();
        let mut registry = ToolRegistry::new();
        registry.add(Arc::new(EchoTool));

        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider { call_count: AtomicUsize::new(0) });
        let context: Arc<dyn ToolContext> = Arc::new(AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf())));

        let mut stream = execute(provider, "be helpful".to_string(), vec![Message::user("hi")], Arc::new(registry), context, 1, CancellationToken::new());

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk);
        }

        let last = chunks.last().unwrap();
        assert!(matches!(last, StreamChunk::Text { text } if text.contains("1-iteration limit")));
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop_before_any_output() {
        let dir = TempDir::new().unwrap();
        let registry = ToolRegistry::new();

        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider { call_count: AtomicUsize::new(0) });
        let context: Arc<dyn ToolContext> = Arc::new(AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf())));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut stream = execute(provider, "be helpful".to_string(), vec![Message::user("hi")], Arc::new(registry), context, 0, cancel);

        assert!(stream.next().await.is_none());
    }
}
