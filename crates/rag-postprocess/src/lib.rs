//! rag-postprocess - Node postprocessors
//!
//! Stages applied between retrieval and synthesis:
//!
//! - [`ScoreReranker`]: order by existing score, keep `top_n`.
//! - [`EmbeddingReranker`]: rescore by query/node embedding similarity,
//!   keep `top_n`.
//! - [`SimilarityPostprocessor`]: drop nodes below a score cutoff.

mod rerank;
mod similarity;

use std::sync::Arc;

pub use rerank::{EmbeddingReranker, ScoreReranker};
pub use similarity::SimilarityPostprocessor;

use rag_core::{Embedder, NodePostprocessor, RerankConfig, RerankStrategy};

/// Build the reranker selected by configuration.
pub fn reranker_from_config(
    config: &RerankConfig,
    embedder: Arc<dyn Embedder>,
) -> Arc<dyn NodePostprocessor> {
    match config.strategy {
        RerankStrategy::Score => Arc::new(ScoreReranker::new(config.top_n)),
        RerankStrategy::Embedding => Arc::new(EmbeddingReranker::new(embedder, config.top_n)),
    }
}
