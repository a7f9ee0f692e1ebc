//! rag-core - Core types and traits for the RAG pipeline
//!
//! This crate provides the node and response types, the collaborator traits
//! (retriever, postprocessor, language model, embedder), error handling and
//! configuration shared by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod text;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{RagError, Result};
pub use text::tokenize;
pub use traits::*;
pub use types::*;
