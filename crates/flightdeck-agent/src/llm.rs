// ABOUTME: Defines the LlmClient trait every language-model provider adapter implements.
// ABOUTME: Also defines CompletionRequest (one system + user prompt) and LlmError.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single-shot completion: one system prompt and one user prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.0,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Errors that can occur while calling a provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// Trait all language-model provider adapters implement. Adapters translate a
/// CompletionRequest into their provider's API and return the text reply.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Provider name for logging and display (e.g. "anthropic", "openai").
    fn provider_name(&self) -> &str;

    /// Model identifier being used (e.g. "claude-sonnet-4-5-20250929").
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_request_defaults_are_deterministic() {
        let req = CompletionRequest::new("system", "prompt");
        assert_eq!(req.max_tokens, 1024);
        assert_eq!(req.temperature, 0.0);

        let req = req.with_max_tokens(256).with_temperature(0.7);
        assert_eq!(req.max_tokens, 256);
        assert_eq!(req.temperature, 0.7);
    }

    #[test]
    fn llm_error_messages() {
        assert_eq!(LlmError::RateLimited.to_string(), "Rate limited");
        assert_eq!(
            LlmError::Provider("Server error: 503".to_string()).to_string(),
            "Provider error: Server error: 503"
        );
    }
}
