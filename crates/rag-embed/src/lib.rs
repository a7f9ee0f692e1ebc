//! rag-embed - Embedding model implementations
//!
//! # Embedders
//!
//! - [`HashingEmbedder`]: deterministic feature-hashing vectors, no model
//!   files or network needed.
//! - [`OpenAiEmbedder`]: any server exposing the OpenAI `/embeddings` API
//!   (OpenAI, Ollama, vLLM, LM Studio).

mod hashing;
mod openai;

use std::sync::Arc;

pub use hashing::HashingEmbedder;
pub use openai::OpenAiEmbedder;

// Re-export the Embedder trait for convenience
pub use rag_core::Embedder;

use rag_core::{EmbeddingConfig, EmbeddingProvider, Result};

/// Build the embedder selected by configuration.
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    Ok(match config.provider {
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::with_dimension(config.dimension)),
        EmbeddingProvider::OpenAi => Arc::new(OpenAiEmbedder::new(config)?),
    })
}
