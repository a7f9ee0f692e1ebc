//! Embeddings from an OpenAI-compatible `/embeddings` endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use rag_core::{resolve_api_key, EmbeddingConfig, Embedder, RagError, Result};

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedder backed by OpenAI, Ollama, vLLM or any compatible server.
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,

    /// Learned from the first response; 0 until then.
    dimension: AtomicUsize,
}

impl OpenAiEmbedder {
    /// Create a new embedder from configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config.base_url, &config.api_key_env)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RagError::embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            dimension: AtomicUsize::new(0),
        })
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        debug!(url = %url, model = %self.model, count = texts.len(), "Requesting embeddings");

        let mut request = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "input": texts }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RagError::embedding(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RagError::embedding(format!("Failed to read response body: {}", e)))?;
        if !status.is_success() {
            return Err(RagError::embedding(format!("HTTP {}: {}", status, body)));
        }

        let vectors = parse_embeddings(&body, texts.len())?;
        if let Some(first) = vectors.first() {
            self.dimension.store(first.len(), Ordering::Relaxed);
        }
        Ok(vectors)
    }
}

/// Decode an embeddings response body, ordered by input index.
fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut parsed: EmbeddingResponse = serde_json::from_str(body)?;
    if parsed.data.len() != expected {
        return Err(RagError::embedding(format!(
            "expected {} embeddings, got {}",
            expected,
            parsed.data.len()
        )));
    }
    parsed.data.sort_by_key(|item| item.index);
    Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.request(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding("empty embedding response"))
    }

    fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }
}
