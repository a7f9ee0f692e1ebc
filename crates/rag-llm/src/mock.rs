//! Offline language model for tests and dry runs.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use rag_core::{Llm, Result, TokenStream};

/// Deterministic model that never leaves the process.
///
/// Answers with a fixed response if one is set, otherwise with a short
/// description of the prompt. Every prompt it receives is recorded.
#[derive(Default)]
pub struct MockLlm {
    response: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `response`.
    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn answer(&self, prompt: &str) -> String {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match &self.response {
            Some(r) => r.clone(),
            None => format!(
                "Mock answer to a {}-line prompt of {} characters.",
                prompt.lines().count(),
                prompt.chars().count()
            ),
        }
    }
}

#[async_trait]
impl Llm for MockLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(self.answer(prompt))
    }

    async fn stream_complete(&self, prompt: &str) -> Result<TokenStream> {
        let chunks: Vec<Result<String>> = self
            .answer(prompt)
            .split_inclusive(' ')
            .map(|c| Ok(c.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
