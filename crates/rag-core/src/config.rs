//! Configuration types for the RAG pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RagError, Result};

/// Text-QA template used to build the generation prompt.
pub const DEFAULT_TEXT_QA_TEMPLATE: &str = "Context information is below.\n\
---------------------\n\
{context_str}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: {query_str}\n\
Answer: ";

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Retrieval configuration.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Reranking configuration.
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Similarity filter configuration.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Language model configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Query engine defaults.
    #[serde(default)]
    pub query: QueryConfig,

    /// Output rendering.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// How hybrid retrieval combines its result lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    /// Min-max normalize each list, then weighted sum.
    #[default]
    RelativeScore,
    /// Reciprocal Rank Fusion.
    Rrf,
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of nodes the hybrid retriever returns.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Fusion mode for the hybrid retriever.
    #[serde(default)]
    pub fusion: FusionMode,

    /// Weight of the vector side (0 = keyword only, 1 = vector only).
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f32,

    /// RRF constant k.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    /// BM25 term frequency saturation.
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f32,

    /// BM25 length normalization.
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            fusion: FusionMode::RelativeScore,
            hybrid_alpha: 0.5,
            rrf_k: 60,
            bm25_k1: 1.2,
            bm25_b: 0.75,
        }
    }
}

/// Reranking strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankStrategy {
    /// Order by the retrieval score.
    #[default]
    Score,
    /// Rescore by query/node embedding similarity.
    Embedding,
}

/// Reranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    #[serde(default)]
    pub strategy: RerankStrategy,

    /// Nodes kept after reranking.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            strategy: RerankStrategy::Score,
            top_n: 5,
        }
    }
}

/// Similarity filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Nodes scoring below this are dropped.
    #[serde(default = "default_similarity_cutoff")]
    pub similarity_cutoff: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            similarity_cutoff: 0.5,
        }
    }
}

/// Language model backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    /// Any endpoint speaking the OpenAI chat completions API.
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Offline deterministic model.
    #[serde(rename = "mock")]
    Mock,
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    /// API base URL, without the `/chat/completions` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            base_url: default_base_url(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            temperature: 0.1,
            max_tokens: None,
            timeout_secs: 120,
        }
    }
}

/// Embedding backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingProvider {
    /// Local feature-hashing embeddings.
    #[default]
    #[serde(rename = "hashing")]
    Hashing,
    /// OpenAI-compatible `/embeddings` endpoint.
    #[serde(rename = "openai")]
    OpenAi,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Vector dimension (hashing provider).
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// API base URL (openai provider).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name (openai provider).
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            dimension: 384,
            base_url: default_base_url(),
            model: default_embedding_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Query engine defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Stream generated text by default.
    #[serde(default = "default_true")]
    pub streaming: bool,

    /// Apply the similarity filter by default.
    #[serde(default = "default_true")]
    pub filtering: bool,

    /// Prompt template with `{context_str}` and `{query_str}` placeholders.
    #[serde(default = "default_template")]
    pub template: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            streaming: true,
            filtering: true,
            template: default_template(),
        }
    }
}

/// Output rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Characters of node text shown per source.
    #[serde(default = "default_source_length")]
    pub source_length: usize,

    /// Print node metadata alongside text.
    #[serde(default = "default_true")]
    pub show_metadata: bool,

    /// Echo nodes after reranking and filtering.
    #[serde(default = "default_true")]
    pub echo_nodes: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            source_length: 100,
            show_metadata: true,
            echo_nodes: true,
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_top_k() -> usize {
    10
}

fn default_hybrid_alpha() -> f32 {
    0.5
}

fn default_rrf_k() -> u32 {
    60
}

fn default_bm25_k1() -> f32 {
    1.2
}

fn default_bm25_b() -> f32 {
    0.75
}

fn default_top_n() -> usize {
    5
}

fn default_similarity_cutoff() -> f32 {
    0.5
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_llm_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_dimension() -> usize {
    384
}

fn default_template() -> String {
    DEFAULT_TEXT_QA_TEMPLATE.to_string()
}

fn default_source_length() -> usize {
    100
}

/// Look up the API key for an endpoint.
///
/// Local endpoints (localhost, 127.0.0.1) run without a key; remote ones
/// require the named environment variable to be set.
pub fn resolve_api_key(base_url: &str, api_key_env: &str) -> Result<Option<String>> {
    if let Ok(key) = std::env::var(api_key_env) {
        if !key.is_empty() {
            return Ok(Some(key));
        }
    }
    if base_url.contains("localhost") || base_url.contains("127.0.0.1") {
        return Ok(None);
    }
    Err(RagError::config(format!(
        "environment variable '{}' is not set for {}",
        api_key_env, base_url
    )))
}

impl RagConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RagError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rag-utilities").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("rag-utilities.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(RagError::config("retrieval.top_k must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.retrieval.hybrid_alpha) {
            return Err(RagError::config(format!(
                "retrieval.hybrid_alpha must be within [0, 1], got {}",
                self.retrieval.hybrid_alpha
            )));
        }
        if self.rerank.top_n == 0 {
            return Err(RagError::config("rerank.top_n must be at least 1"));
        }
        if self.filter.similarity_cutoff.is_nan() {
            return Err(RagError::config("filter.similarity_cutoff must be a number"));
        }
        if self.embedding.dimension == 0 {
            return Err(RagError::config("embedding.dimension must be at least 1"));
        }
        for placeholder in ["{context_str}", "{query_str}"] {
            if !self.query.template.contains(placeholder) {
                return Err(RagError::config(format!(
                    "query.template is missing {}",
                    placeholder
                )));
            }
        }
        Ok(())
    }

    /// Serialize as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RagError::config(format!("Failed to serialize config: {}", e)))
    }
}
