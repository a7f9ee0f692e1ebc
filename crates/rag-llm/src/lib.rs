//! rag-llm - Language model clients
//!
//! - [`OpenAiLlm`]: chat completions over HTTP, plain or streamed as
//!   Server-Sent Events.
//! - [`MockLlm`]: deterministic offline model.
//!
//! Streaming responses are decoded incrementally by [`token_stream`]; chunks
//! are read from the connection only as the caller polls for them.

mod mock;
mod openai;
mod sse;

use std::sync::Arc;

pub use mock::MockLlm;
pub use openai::OpenAiLlm;
pub use sse::{parse_delta, token_stream, SseDecoder, SseEvent};

// Re-export the Llm trait for convenience
pub use rag_core::Llm;

use rag_core::{LlmConfig, LlmProvider, Result};

/// Build the language model selected by configuration.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn Llm>> {
    Ok(match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiLlm::new(config)?),
        LlmProvider::Mock => Arc::new(MockLlm::new()),
    })
}
