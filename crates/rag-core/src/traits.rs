//! Core traits defining the interfaces between pipeline stages.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{NodeWithScore, QueryBundle, TokenStream};

/// Fetches candidate nodes for a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve scored nodes, best first.
    async fn retrieve(&self, query: &QueryBundle) -> Result<Vec<NodeWithScore>>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// A stage applied to retrieved nodes before synthesis.
///
/// Rerankers and filters both implement this. A postprocessor may reorder,
/// rescore or drop nodes, but never introduces nodes it was not given.
#[async_trait]
pub trait NodePostprocessor: Send + Sync {
    async fn postprocess_nodes(
        &self,
        nodes: Vec<NodeWithScore>,
        query: Option<&QueryBundle>,
    ) -> Result<Vec<NodeWithScore>>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Text generation model.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Generate a full completion for the prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Generate a completion as a stream of text chunks.
    async fn stream_complete(&self, prompt: &str) -> Result<TokenStream>;

    /// Model identifier used in logs.
    fn model_name(&self) -> &str;
}

/// Embedding model trait.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of document texts.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Cosine similarity of two vectors; 0.0 when either is all zeros or the
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
