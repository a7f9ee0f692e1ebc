//! rag-query - Query engine and one-call RAG helpers
//!
//! This crate ties a retriever, a reranker, an optional similarity filter and
//! a language model into a single question-answering pass.
//!
//! # Features
//!
//! - Retrieve and rerank nodes for a prompt
//! - Filter nodes by a similarity cutoff
//! - Render nodes and responses as text
//! - Generate answers, streamed or complete, with their sources
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_query::{RagUtilities, ResponseOptions};
//! use std::sync::Arc;
//!
//! let utils = RagUtilities::new(retriever, reranker, llm, &config)?;
//! let mut out = std::io::stdout();
//! let nodes = utils.retrieve_and_rerank("what is rust?", &mut out).await?;
//! let kept = utils.filter_nodes(nodes, Some(0.5), &mut out)?;
//! utils
//!     .generate_response("what is rust?", ResponseOptions::default(), &mut out)
//!     .await?;
//! ```

mod display;
mod engine;
mod orchestrator;
mod synth;

pub use display::NodeDisplay;
pub use engine::RetrieverQueryEngine;
pub use orchestrator::{RagUtilities, ResponseOptions};
pub use synth::{build_context, PromptTemplate};

// Re-export for convenience
pub use rag_core::{NodeWithScore, QueryResponse, Response, StreamingResponse};
