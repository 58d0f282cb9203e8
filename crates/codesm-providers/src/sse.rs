//! Minimal Server-Sent-Events line parser shared by the Anthropic and
//! OpenAI-wire-format adapters. Each vendor streams `data: {...}\n\n` frames
//! over a chunked HTTP response; this module turns the raw byte stream into
//! a stream of parsed JSON payloads, skipping `[DONE]` sentinels and
//! comment/keep-alive lines.

use futures_util::{Stream, StreamExt};
use serde_json::Value;

/// Buffers raw bytes into SSE frames and parses each frame's `data:` field
/// as JSON. A `data: [DONE]` frame (OpenAI's stream terminator) ends the
/// stream without an error.
pub fn parse_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<Value, String>>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    async_stream_lite(byte_stream)
}

fn async_stream_lite<S, E>(mut byte_stream: S) -> impl Stream<Item = Result<Value, String>>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut buffer = String::new();
    futures::stream::poll_fn(move |cx| loop {
        if let Some(frame_end) = buffer.find("\n\n") {
            let frame = buffer[..frame_end].to_string();
            buffer.drain(..frame_end + 2);
            if let Some(event) = parse_frame(&frame) {
                return std::task::Poll::Ready(Some(event));
            }
            continue;
        }

        match byte_stream.poll_next_unpin(cx) {
            std::task::Poll::Ready(Some(Ok(bytes))) => {
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                continue;
            }
            std::task::Poll::Ready(Some(Err(e))) => {
                return std::task::Poll::Ready(Some(Err(e.to_string())));
            }
            std::task::Poll::Ready(None) => {
                if let Some(event) = parse_frame(&buffer) {
                    buffer.clear();
                    return std::task::Poll::Ready(Some(event));
                }
                return std::task::Poll::Ready(None);
            }
            std::task::Poll::Pending => return std::task::Poll::Pending,
        }
    })
}

fn parse_frame(frame: &str) -> Option<Result<Value, String>> {
    let mut data_lines = Vec::new();
    for line in frame.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            data_lines.push(data.trim_start());
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    let payload = data_lines.join("\n");
    if payload.trim() == "[DONE]" {
        return None;
    }
    Some(serde_json::from_str(&payload).map_err(|e| format!("malformed SSE JSON frame: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn parses_single_frame() {
        let chunks: Vec<Result<bytes::Bytes, std::io::Error>> =
            vec![Ok(bytes::Bytes::from("data: {\"a\":1}\n\n"))];
        let parsed: Vec<_> = parse_sse(stream::iter(chunks)).collect().await;
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].as_ref().unwrap()["a"], 1);
    }

    #[tokio::test]
    async fn skips_done_sentinel() {
        let chunks: Vec<Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::from("data: {\"a\":1}\n\n")),
            Ok(bytes::Bytes::from("data: [DONE]\n\n")),
        ];
        let parsed: Vec<_> = parse_sse(stream::iter(chunks)).collect().await;
        assert_eq!(parsed.len(), 1);
    }

    #[tokio::test]
    async fn reassembles_frames_split_across_chunks() {
        let chunks: Vec<Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::from("data: {\"a\":")),
            Ok(bytes::Bytes::from("1}\n\n")),
        ];
        let parsed: Vec<_> = parse_sse(stream::iter(chunks)).collect().await;
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].as_ref().unwrap()["a"], 1);
    }
}
