//! Rerankers: reorder and trim retrieved nodes.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use rag_core::{
    cosine_similarity, Embedder, NodePostprocessor, NodeWithScore, QueryBundle, RagError, Result,
};

/// Stable descending sort by score; NaN sorts last.
fn sort_by_score_desc(nodes: &mut [NodeWithScore]) {
    let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    nodes.sort_by(|a, b| key(b.score).total_cmp(&key(a.score)));
}

/// Reranks by the score nodes already carry and keeps the best `top_n`.
#[derive(Debug, Clone, Copy)]
pub struct ScoreReranker {
    pub top_n: usize,
}

impl ScoreReranker {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }
}

#[async_trait]
impl NodePostprocessor for ScoreReranker {
    async fn postprocess_nodes(
        &self,
        mut nodes: Vec<NodeWithScore>,
        _query: Option<&QueryBundle>,
    ) -> Result<Vec<NodeWithScore>> {
        sort_by_score_desc(&mut nodes);
        nodes.truncate(self.top_n);
        Ok(nodes)
    }

    fn name(&self) -> &str {
        "score_rerank"
    }
}

/// Rescores nodes by embedding similarity to the query and keeps the best
/// `top_n`.
///
/// Each node's score is replaced with the cosine similarity between the query
/// embedding and the node text embedding. A query is required.
pub struct EmbeddingReranker {
    embedder: Arc<dyn Embedder>,
    top_n: usize,
}

impl EmbeddingReranker {
    pub fn new(embedder: Arc<dyn Embedder>, top_n: usize) -> Self {
        Self { embedder, top_n }
    }
}

#[async_trait]
impl NodePostprocessor for EmbeddingReranker {
    async fn postprocess_nodes(
        &self,
        mut nodes: Vec<NodeWithScore>,
        query: Option<&QueryBundle>,
    ) -> Result<Vec<NodeWithScore>> {
        let query =
            query.ok_or_else(|| RagError::postprocess("embedding reranker needs a query"))?;
        if nodes.is_empty() {
            return Ok(nodes);
        }

        let query_embedding = self.embedder.embed_query(&query.query_str).await?;
        let texts: Vec<&str> = nodes.iter().map(|n| n.text()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        if embeddings.len() != nodes.len() {
            return Err(RagError::postprocess(format!(
                "embedded {} of {} nodes",
                embeddings.len(),
                nodes.len()
            )));
        }

        for (node, embedding) in nodes.iter_mut().zip(&embeddings) {
            node.score = cosine_similarity(&query_embedding, embedding);
        }
        sort_by_score_desc(&mut nodes);
        nodes.truncate(self.top_n);

        debug!("Embedding rerank kept {} nodes", nodes.len());
        Ok(nodes)
    }

    fn name(&self) -> &str {
        "embedding_rerank"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_core::Node;
    use rag_embed::HashingEmbedder;

    fn scored(items: &[(&str, f32)]) -> Vec<NodeWithScore> {
        items
            .iter()
            .map(|(text, s)| NodeWithScore::new(Node::new(text), *s))
            .collect()
    }

    #[tokio::test]
    async fn test_score_reranker_sorts_and_truncates() {
        let nodes = scored(&[("a", 0.2), ("b", 0.9), ("c", f32::NAN), ("d", 0.5)]);
        let reranked = ScoreReranker::new(3).postprocess_nodes(nodes, None).await.unwrap();

        let texts: Vec<&str> = reranked.iter().map(|n| n.text()).collect();
        assert_eq!(texts, vec!["b", "d", "a"]);
    }

    #[tokio::test]
    async fn test_score_reranker_is_stable_on_ties() {
        let nodes = scored(&[("first", 0.5), ("second", 0.5), ("third", 0.7)]);
        let reranked = ScoreReranker::new(10).postprocess_nodes(nodes, None).await.unwrap();

        let texts: Vec<&str> = reranked.iter().map(|n| n.text()).collect();
        assert_eq!(texts, vec!["third", "first", "second"]);
    }

    #[tokio::test]
    async fn test_embedding_reranker_rescores() {
        let nodes = scored(&[
            ("bananas are yellow", 0.99),
            ("rust ownership model", 0.10),
        ]);
        let ids: Vec<_> = nodes.iter().map(|n| n.id()).collect();
        let reranker = EmbeddingReranker::new(Arc::new(HashingEmbedder::new()), 5);

        let reranked = reranker
            .postprocess_nodes(nodes, Some(&QueryBundle::new("rust ownership model")))
            .await
            .unwrap();

        assert_eq!(reranked[0].text(), "rust ownership model");
        assert!((reranked[0].score - 1.0).abs() < 1e-5);
        assert!(reranked.iter().all(|n| ids.contains(&n.id())));
    }

    #[tokio::test]
    async fn test_embedding_reranker_requires_query() {
        let reranker = EmbeddingReranker::new(Arc::new(HashingEmbedder::new()), 5);
        let err = reranker
            .postprocess_nodes(scored(&[("a", 1.0)]), None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "POSTPROCESS_ERROR");
    }
}
