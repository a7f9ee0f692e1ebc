//! Similarity cutoff filter.

use async_trait::async_trait;
use tracing::debug;

use rag_core::{NodePostprocessor, NodeWithScore, QueryBundle, Result};

/// Drops nodes scoring below a cutoff.
///
/// Survivors keep their relative order and are passed through untouched.
/// NaN scores never pass.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityPostprocessor {
    pub similarity_cutoff: f32,
}

impl SimilarityPostprocessor {
    pub fn new(similarity_cutoff: f32) -> Self {
        Self { similarity_cutoff }
    }

    /// Synchronous form of the filter.
    pub fn filter(&self, nodes: Vec<NodeWithScore>) -> Vec<NodeWithScore> {
        let before = nodes.len();
        let kept: Vec<NodeWithScore> = nodes
            .into_iter()
            .filter(|n| n.score >= self.similarity_cutoff)
            .collect();
        debug!(
            "Similarity cutoff {} kept {} of {} nodes",
            self.similarity_cutoff,
            kept.len(),
            before
        );
        kept
    }
}

impl Default for SimilarityPostprocessor {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[async_trait]
impl NodePostprocessor for SimilarityPostprocessor {
    async fn postprocess_nodes(
        &self,
        nodes: Vec<NodeWithScore>,
        _query: Option<&QueryBundle>,
    ) -> Result<Vec<NodeWithScore>> {
        Ok(self.filter(nodes))
    }

    fn name(&self) -> &str {
        "similarity_cutoff"
    }
}
