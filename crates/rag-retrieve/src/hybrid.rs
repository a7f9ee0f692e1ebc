//! Hybrid retrieval: several retrievers fused into one ranking.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info};

use rag_core::{
    Embedder, FusionMode, NodeWithScore, QueryBundle, RagError, Result, RetrievalConfig, Retriever,
};

use crate::corpus::Corpus;
use crate::fusion::{reciprocal_rank_fusion, relative_score_fusion};
use crate::keyword::KeywordRetriever;
use crate::vector::VectorRetriever;

/// Retriever that queries every inner retriever and fuses the results.
///
/// Failures in any inner retriever fail the whole retrieval.
pub struct HybridRetriever {
    /// Inner retrievers with their fusion weight.
    retrievers: Vec<(Arc<dyn Retriever>, f32)>,
    mode: FusionMode,
    rrf_k: f32,
    top_k: usize,
}

impl HybridRetriever {
    /// Create a hybrid retriever from weighted inner retrievers.
    pub fn new(
        retrievers: Vec<(Arc<dyn Retriever>, f32)>,
        mode: FusionMode,
        top_k: usize,
    ) -> Result<Self> {
        if retrievers.is_empty() {
            return Err(RagError::invalid_argument(
                "hybrid retriever needs at least one retriever",
            ));
        }
        Ok(Self {
            retrievers,
            mode,
            rrf_k: crate::fusion::DEFAULT_RRF_K,
            top_k,
        })
    }

    /// Set the RRF constant.
    pub fn with_rrf_k(mut self, rrf_k: f32) -> Self {
        self.rrf_k = rrf_k;
        self
    }

    /// Build the standard vector + keyword pair over a corpus.
    ///
    /// The vector side is weighted `hybrid_alpha`, the keyword side
    /// `1 - hybrid_alpha`. Each side fetches more than `top_k` so fusion has
    /// room to reorder.
    pub async fn from_config(
        config: &RetrievalConfig,
        corpus: &Corpus,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let fetch_k = (config.top_k * 2).max(20);
        let nodes = corpus.nodes().to_vec();

        let vector = VectorRetriever::build(nodes.clone(), embedder, fetch_k).await?;
        let keyword =
            KeywordRetriever::with_params(nodes, fetch_k, config.bm25_k1, config.bm25_b);

        Ok(Self::new(
            vec![
                (Arc::new(vector) as Arc<dyn Retriever>, config.hybrid_alpha),
                (Arc::new(keyword) as Arc<dyn Retriever>, 1.0 - config.hybrid_alpha),
            ],
            config.fusion,
            config.top_k,
        )?
        .with_rrf_k(config.rrf_k as f32))
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    async fn retrieve(&self, query: &QueryBundle) -> Result<Vec<NodeWithScore>> {
        let start = Instant::now();

        let lists = try_join_all(self.retrievers.iter().map(|(r, _)| r.retrieve(query))).await?;

        for ((retriever, _), list) in self.retrievers.iter().zip(&lists) {
            debug!("Retriever '{}' returned {} nodes", retriever.name(), list.len());
        }

        let fused = match self.mode {
            FusionMode::Rrf => reciprocal_rank_fusion(lists, self.rrf_k, self.top_k),
            FusionMode::RelativeScore => relative_score_fusion(
                lists
                    .into_iter()
                    .zip(self.retrievers.iter().map(|(_, w)| *w))
                    .collect(),
                self.top_k,
            ),
        };

        info!(
            "Hybrid retrieval returned {} nodes in {}ms",
            fused.len(),
            start.elapsed().as_millis()
        );

        Ok(fused)
    }

    fn name(&self) -> &str {
        "hybrid"
    }
}
