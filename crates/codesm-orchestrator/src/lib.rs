//! The ReAct loop: stream the provider's output, dispatch any tool calls it
//! made, feed the results back, and repeat until the model stops asking for
//! tools or an iteration cap is hit.
//!
//! The orchestrator holds no session state of its own — it takes a message
//! list, runs the loop, and streams [`codesm_core::StreamChunk`]s back.
//! Persisting the assistant's final text (and any tool-display metadata) is
//! the caller's job.

pub mod accumulator;
pub mod executor;

pub use executor::{execute, OrchestratorStream};
