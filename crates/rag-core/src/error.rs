//! Error types for the RAG pipeline.

use thiserror::Error;

/// Result type alias using RagError.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur anywhere in the pipeline.
#[derive(Error, Debug)]
pub enum RagError {
    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Retriever failed.
    #[error("Retrieval error: {message}")]
    Retrieval { message: String },

    /// Reranker or filter failed.
    #[error("Postprocess error: {message}")]
    Postprocess { message: String },

    /// Embedding model error.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Language model request failed.
    #[error("LLM error: {message}")]
    Llm { message: String },

    /// A streamed response broke off or could not be decoded.
    #[error("Streaming error: {message}")]
    Streaming { message: String },

    /// Corpus file could not be loaded.
    #[error("Failed to load corpus from {path}: {reason}")]
    Corpus { path: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RagError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a retrieval error.
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval {
            message: message.into(),
        }
    }

    /// Create a postprocess error.
    pub fn postprocess(message: impl Into<String>) -> Self {
        Self::Postprocess {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    /// Create a streaming error.
    pub fn streaming(message: impl Into<String>) -> Self {
        Self::Streaming {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for the error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Retrieval { .. } => "RETRIEVAL_ERROR",
            Self::Postprocess { .. } => "POSTPROCESS_ERROR",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Llm { .. } => "LLM_ERROR",
            Self::Streaming { .. } => "STREAMING_ERROR",
            Self::Corpus { .. } => "CORPUS_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
