//! The `router/*` provider target: an OpenAI-compatible endpoint that
//! multiplexes many vendors behind a single base URL (e.g. OpenRouter).
//! Reuses the OpenAI wire format verbatim and only swaps the endpoint and
//! auth header name.

use crate::error::ProviderError;
use crate::openai::OpenAiProvider;
use crate::provider::{ChunkStream, Provider};
use async_trait::async_trait;
use codesm_core::{Message, ToolSchema};

pub struct RouterProvider {
    inner: OpenAiProvider,
}

impl RouterProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            inner: OpenAiProvider::new(api_key, model).with_base_url(base_url),
        }
    }
}

#[async_trait]
impl Provider for RouterProvider {
    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
    ) -> Result<ChunkStream, ProviderError> {
        self.inner.stream(system, messages, tools).await
    }
}
