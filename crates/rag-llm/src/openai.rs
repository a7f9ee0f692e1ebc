//! OpenAI-compatible chat completions client.
//!
//! Works with OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio and any endpoint
//! following the chat completions API format.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use rag_core::{resolve_api_key, Llm, LlmConfig, RagError, Result, TokenStream};

use crate::sse::token_stream;

/// Chat completions client.
pub struct OpenAiLlm {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAiLlm {
    /// Create a new client from configuration.
    ///
    /// Reads the API key from the environment variable named in
    /// `config.api_key_env`; local endpoints may run without one.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config.base_url, &config.api_key_env)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::llm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request_body(&self, prompt: &str, stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "stream": stream,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, "Sending chat completion request");

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RagError::llm(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }
        Ok(response)
    }
}

fn map_http_error(status: StatusCode, body: &str) -> RagError {
    match status.as_u16() {
        401 | 403 => RagError::llm(format!("Authentication failed ({}): {}", status, body)),
        404 => RagError::llm(format!("Model or endpoint not found: {}", body)),
        429 => RagError::llm(format!("Rate limited: {}", body)),
        s if s >= 500 => RagError::llm(format!("Server error ({}): {}", status, body)),
        _ => RagError::llm(format!("HTTP {}: {}", status, body)),
    }
}

/// Pull the assistant message out of a non-streaming response.
fn parse_completion(json: &Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| RagError::llm(format!("Unexpected completion response: {}", json)))
}

#[async_trait]
impl Llm for OpenAiLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self.send(&self.request_body(prompt, false)).await?;
        let body = response
            .text()
            .await
            .map_err(|e| RagError::llm(format!("Failed to read response body: {}", e)))?;
        let json: Value = serde_json::from_str(&body)?;
        parse_completion(&json)
    }

    async fn stream_complete(&self, prompt: &str) -> Result<TokenStream> {
        let response = self.send(&self.request_body(prompt, true)).await?;
        let bytes = response.bytes_stream().map(|chunk| {
            chunk
                .map(|b| b.to_vec())
                .map_err(|e| RagError::streaming(format!("Failed to read streaming chunk: {}", e)))
        });
        Ok(token_stream(bytes))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> LlmConfig {
        LlmConfig {
            api_key_env: "RAG_TEST_UNSET_LLM_KEY".to_string(),
            max_tokens: Some(256),
            ..Default::default()
        }
    }

    #[test]
    fn test_request_body() {
        let llm = OpenAiLlm::new(&local_config()).unwrap();
        let body = llm.request_body("What is X?", true);

        assert_eq!(body["model"], "llama3.1:8b");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "What is X?");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn test_parse_completion() {
        let json = json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "X is Y." } }]
        });
        assert_eq!(parse_completion(&json).unwrap(), "X is Y.");
        assert!(parse_completion(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_map_http_error() {
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(err.error_code(), "LLM_ERROR");
        assert!(err.to_string().contains("Rate limited"));
        assert!(map_http_error(StatusCode::BAD_GATEWAY, "")
            .to_string()
            .contains("Server error"));
    }

    #[test]
    fn test_remote_endpoint_requires_key() {
        let config = LlmConfig {
            base_url: "https://api.example.com/v1".to_string(),
            ..local_config()
        };
        assert!(OpenAiLlm::new(&config).is_err());
    }
}
