//! Score fusion for combining retriever result lists.

use std::collections::HashMap;

use rag_core::NodeWithScore;
use ulid::Ulid;

/// RRF constant (commonly 60).
/// Higher values give more weight to lower-ranked results.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Accumulates fused scores per node id, remembering first-seen order so
/// equal scores come out in a stable order.
#[derive(Default)]
struct Accumulator {
    index: HashMap<Ulid, usize>,
    entries: Vec<NodeWithScore>,
}

impl Accumulator {
    fn add(&mut self, node: NodeWithScore, score: f32) {
        match self.index.get(&node.id()) {
            Some(&i) => self.entries[i].score += score,
            None => {
                self.index.insert(node.id(), self.entries.len());
                self.entries.push(NodeWithScore::new(node.node, score));
            }
        }
    }

    fn finish(mut self, k: usize) -> Vec<NodeWithScore> {
        self.entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.entries.truncate(k);
        self.entries
    }
}

/// Fuse multiple result lists using Reciprocal Rank Fusion.
///
/// RRF score = Σ (1 / (rrf_k + rank_i)) over every list containing the node,
/// with 1-based ranks.
///
/// # Arguments
/// * `results` - Result lists, each ordered best first
/// * `rrf_k` - RRF constant
/// * `k` - Maximum number of results to return
///
/// # Returns
/// Nodes with their fused score, sorted by fused score descending
pub fn reciprocal_rank_fusion(
    results: Vec<Vec<NodeWithScore>>,
    rrf_k: f32,
    k: usize,
) -> Vec<NodeWithScore> {
    let mut acc = Accumulator::default();

    for result_list in results {
        for (rank, node) in result_list.into_iter().enumerate() {
            let rrf_score = 1.0 / (rrf_k + rank as f32 + 1.0);
            acc.add(node, rrf_score);
        }
    }

    acc.finish(k)
}

/// Combine results by min-max normalizing each list to [0, 1] and summing
/// the weighted normalized scores.
///
/// A list whose scores are all equal normalizes to 1.0 for every entry.
///
/// # Arguments
/// * `results` - Vector of (results, weight) pairs
/// * `k` - Maximum number of results to return
pub fn relative_score_fusion(
    results: Vec<(Vec<NodeWithScore>, f32)>,
    k: usize,
) -> Vec<NodeWithScore> {
    let mut acc = Accumulator::default();

    for (result_list, weight) in results {
        let (min, max) = result_list
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), n| {
                (lo.min(n.score), hi.max(n.score))
            });
        let range = max - min;

        for node in result_list {
            let normalized = if range > 0.0 {
                (node.score - min) / range
            } else {
                1.0
            };
            acc.add(node, normalized * weight);
        }
    }

    acc.finish(k)
}
