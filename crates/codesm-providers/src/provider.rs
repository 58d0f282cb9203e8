//! The neutral provider contract every vendor adapter implements.

use crate::error::ProviderError;
use async_trait::async_trait;
use codesm_core::{Message, StreamChunk, ToolSchema};
use futures::stream::BoxStream;

pub type ChunkStream = BoxStream<'static, Result<StreamChunk, ProviderError>>;

/// Translates the neutral message list to a vendor's wire format and streams
/// its response back as `StreamChunk`s. Implementations must never mutate
/// the input messages.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The model identifier this provider instance was constructed for,
    /// e.g. `claude-sonnet-4-20250514`.
    fn model(&self) -> &str;

    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
    ) -> Result<ChunkStream, ProviderError>;
}
