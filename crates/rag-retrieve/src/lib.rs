//! rag-retrieve - Retrievers over an in-memory corpus
//!
//! # Retrievers
//!
//! - [`KeywordRetriever`]: Okapi BM25 over lowercase alphanumeric terms.
//! - [`VectorRetriever`]: cosine similarity against precomputed embeddings.
//! - [`HybridRetriever`]: runs several retrievers and fuses their rankings
//!   with relative-score fusion or Reciprocal Rank Fusion (RRF).
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_retrieve::{Corpus, HybridRetriever};
//!
//! let corpus = Corpus::load(Path::new("nodes.jsonl"))?;
//! let retriever = HybridRetriever::from_config(&config.retrieval, &corpus, embedder).await?;
//! let nodes = retriever.retrieve(&QueryBundle::new("error handling")).await?;
//! ```

mod corpus;
mod fusion;
mod hybrid;
mod keyword;
mod vector;

pub use corpus::Corpus;
pub use fusion::{reciprocal_rank_fusion, relative_score_fusion, DEFAULT_RRF_K};
pub use hybrid::HybridRetriever;
pub use keyword::KeywordRetriever;
pub use vector::VectorRetriever;

// Re-export for convenience
pub use rag_core::{NodeWithScore, QueryBundle, Retriever};
