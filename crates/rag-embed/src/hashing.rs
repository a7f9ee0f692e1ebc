//! Feature-hashing embedder.

use async_trait::async_trait;

use rag_core::{tokenize, Embedder, Result};

/// Default vector dimension.
const DEFAULT_DIMENSION: usize = 384;

/// Deterministic offline embedder.
///
/// Each term is hashed into a signed bucket of a fixed-size vector, so texts
/// sharing terms land close together under cosine similarity. Vectors are L2
/// normalized; text without terms embeds to all zeros.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create a new hashing embedder with default settings.
    pub fn new() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
        }
    }

    /// Create a hashing embedder with a custom dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        for term in tokenize(text) {
            let hash = blake3::hash(term.as_bytes());
            let bytes = hash.as_bytes();
            let bucket = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as usize
                % self.dimension;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        // L2 normalize
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        embedding
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_core::cosine_similarity;

    #[tokio::test]
    async fn test_hashing_embedder() {
        let embedder = HashingEmbedder::with_dimension(64);
        assert_eq!(embedder.dimension(), 64);

        let texts = ["Hello world", "Rust is great"];
        let embeddings = embedder.embed_documents(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 64);

        let norm: f32 = embeddings[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_terms_are_closer() {
        let embedder = HashingEmbedder::new();
        let query = embedder.embed_query("rust borrow checker").await.unwrap();
        let docs = embedder
            .embed_documents(&[
                "The borrow checker enforces Rust ownership rules",
                "Bananas are rich in potassium",
            ])
            .await
            .unwrap();

        assert!(cosine_similarity(&query, &docs[0]) > cosine_similarity(&query, &docs[1]));
    }

    #[tokio::test]
    async fn test_deterministic_and_empty() {
        let embedder = HashingEmbedder::new();
        let a = embedder.embed_query("same words").await.unwrap();
        let b = embedder.embed_query("Same, words!").await.unwrap();
        assert_eq!(a, b);

        let empty = embedder.embed_query("   ").await.unwrap();
        assert!(empty.iter().all(|x| *x == 0.0));
    }
}
