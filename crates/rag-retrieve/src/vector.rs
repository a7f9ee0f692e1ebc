//! Embedding similarity retriever.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use rag_core::{
    cosine_similarity, Embedder, Node, NodeWithScore, QueryBundle, RagError, Result, Retriever,
};

/// Retriever ranking nodes by cosine similarity to the query embedding.
///
/// Node embeddings are computed once, when the retriever is built.
pub struct VectorRetriever {
    nodes: Vec<Node>,
    embeddings: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl VectorRetriever {
    /// Embed `nodes` and build the retriever.
    pub async fn build(nodes: Vec<Node>, embedder: Arc<dyn Embedder>, top_k: usize) -> Result<Self> {
        let texts: Vec<&str> = nodes.iter().map(|n| n.text.as_str()).collect();
        let embeddings = embedder.embed_documents(&texts).await?;
        if embeddings.len() != nodes.len() {
            return Err(RagError::embedding(format!(
                "embedded {} of {} nodes",
                embeddings.len(),
                nodes.len()
            )));
        }

        info!("Embedded {} nodes for vector retrieval", nodes.len());

        Ok(Self {
            nodes,
            embeddings,
            embedder,
            top_k,
        })
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &QueryBundle) -> Result<Vec<NodeWithScore>> {
        let query_embedding = self.embedder.embed_query(&query.query_str).await?;

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(idx, e)| (idx, cosine_similarity(&query_embedding, e)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.top_k);

        debug!("Vector search returned {} nodes", scored.len());

        Ok(scored
            .into_iter()
            .map(|(idx, score)| NodeWithScore::new(self.nodes[idx].clone(), score))
            .collect())
    }

    fn name(&self) -> &str {
        "vector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_embed::HashingEmbedder;

    #[tokio::test]
    async fn test_vector_retriever_orders_by_similarity() {
        let nodes = vec![
            Node::new("bananas and potassium"),
            Node::new("rust ownership and borrowing"),
            Node::new("rust ownership"),
        ];
        let retriever = VectorRetriever::build(nodes, Arc::new(HashingEmbedder::new()), 2)
            .await
            .unwrap();

        let results = retriever
            .retrieve(&QueryBundle::new("rust ownership"))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text(), "rust ownership");
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert!(results[0].score >= results[1].score);
    }
}
