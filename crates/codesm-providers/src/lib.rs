//! Neutral streaming chat provider contract plus the Anthropic, OpenAI, and
//! router (OpenAI-compatible multiplexer) adapters.

pub mod anthropic;
pub mod error;
pub mod openai;
pub mod provider;
pub mod registry;
pub mod router;
mod sse;

pub use anthropic::AnthropicProvider;
pub use error::ProviderError;
pub use openai::OpenAiProvider;
pub use provider::{ChunkStream, Provider};
pub use registry::ProviderRegistry;
pub use router::RouterProvider;
