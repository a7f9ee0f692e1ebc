//! BM25 keyword retriever over an in-memory corpus.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use rag_core::{tokenize, Node, NodeWithScore, QueryBundle, Result, Retriever};

/// Keyword retriever scoring nodes with Okapi BM25.
pub struct KeywordRetriever {
    nodes: Vec<Node>,

    /// Term frequencies per node.
    term_freqs: Vec<HashMap<String, u32>>,

    /// Term count per node.
    lengths: Vec<u32>,

    /// Number of nodes containing each term.
    doc_freqs: HashMap<String, usize>,

    avg_length: f32,
    top_k: usize,
    k1: f32,
    b: f32,
}

impl KeywordRetriever {
    /// Index `nodes` with the standard BM25 parameters (k1 = 1.2, b = 0.75).
    pub fn new(nodes: Vec<Node>, top_k: usize) -> Self {
        Self::with_params(nodes, top_k, 1.2, 0.75)
    }

    pub fn with_params(nodes: Vec<Node>, top_k: usize, k1: f32, b: f32) -> Self {
        let mut term_freqs = Vec::with_capacity(nodes.len());
        let mut lengths = Vec::with_capacity(nodes.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for node in &nodes {
            let terms = tokenize(&node.text);
            lengths.push(terms.len() as u32);

            let mut tf: HashMap<String, u32> = HashMap::new();
            for term in terms {
                *tf.entry(term).or_default() += 1;
            }
            for term in tf.keys() {
                *doc_freqs.entry(term.clone()).or_default() += 1;
            }
            term_freqs.push(tf);
        }

        let avg_length = if lengths.is_empty() {
            0.0
        } else {
            lengths.iter().sum::<u32>() as f32 / lengths.len() as f32
        };

        Self {
            nodes,
            term_freqs,
            lengths,
            doc_freqs,
            avg_length,
            top_k,
            k1,
            b,
        }
    }

    /// IDF = ln(1 + (N - df + 0.5) / (df + 0.5))
    fn idf(&self, term: &str) -> f32 {
        let df = match self.doc_freqs.get(term) {
            Some(&df) if df > 0 => df as f32,
            _ => return 0.0,
        };
        let n = self.nodes.len() as f32;
        (1.0 + ((n - df + 0.5) / (df + 0.5)).max(0.0)).ln()
    }

    fn score(&self, idx: usize, query_terms: &[(String, f32)]) -> f32 {
        if self.avg_length <= 0.0 {
            return 0.0;
        }
        let tf_map = &self.term_freqs[idx];
        let norm = 1.0 - self.b + self.b * (self.lengths[idx] as f32 / self.avg_length);

        query_terms
            .iter()
            .map(|(term, idf)| {
                let tf = *tf_map.get(term).unwrap_or(&0) as f32;
                if tf == 0.0 {
                    0.0
                } else {
                    idf * tf * (self.k1 + 1.0) / (tf + self.k1 * norm)
                }
            })
            .sum()
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &QueryBundle) -> Result<Vec<NodeWithScore>> {
        let mut terms = tokenize(&query.query_str);
        terms.sort();
        terms.dedup();
        let query_terms: Vec<(String, f32)> = terms
            .into_iter()
            .map(|t| {
                let idf = self.idf(&t);
                (t, idf)
            })
            .collect();

        let mut scored: Vec<(usize, f32)> = (0..self.nodes.len())
            .map(|idx| (idx, self.score(idx, &query_terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.top_k);

        debug!("Keyword search matched {} nodes", scored.len());

        Ok(scored
            .into_iter()
            .map(|(idx, score)| NodeWithScore::new(self.nodes[idx].clone(), score))
            .collect())
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Node> {
        vec![
            Node::new("Rust guarantees memory safety without a garbage collector."),
            Node::new("Python uses a garbage collector and reference counting."),
            Node::new("The borrow checker enforces Rust ownership rules at compile time."),
            Node::new("Bananas are an excellent source of potassium."),
        ]
    }

    #[tokio::test]
    async fn test_keyword_ranks_matching_nodes() {
        let retriever = KeywordRetriever::new(corpus(), 10);
        let results = retriever
            .retrieve(&QueryBundle::new("rust borrow checker"))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].text().contains("borrow checker"));
        assert!(results[0].score > results[1].score);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_keyword_no_match_and_top_k() {
        let retriever = KeywordRetriever::new(corpus(), 1);
        let none = retriever.retrieve(&QueryBundle::new("quantum")).await.unwrap();
        assert!(none.is_empty());

        let one = retriever
            .retrieve(&QueryBundle::new("garbage collector"))
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn test_keyword_empty_corpus() {
        let retriever = KeywordRetriever::new(Vec::new(), 5);
        let results = retriever.retrieve(&QueryBundle::new("anything")).await.unwrap();
        assert!(results.is_empty());
    }
}
