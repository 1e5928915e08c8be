// ABOUTME: OpenAI Chat Completions API adapter implementing the LlmClient trait.
// ABOUTME: Sends system + user messages and returns the first choice's message content.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::providers::{ProviderSpec, check_status};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o";

pub const SPEC: ProviderSpec = ProviderSpec {
    name: "openai",
    key_var: "OPENAI_API_KEY",
    model_var: "OPENAI_MODEL",
    base_url_var: "OPENAI_BASE_URL",
    default_model: DEFAULT_MODEL,
    default_base_url: DEFAULT_BASE_URL,
    connect,
};

fn connect(api_key: String, base_url: String, model: String) -> Arc<dyn LlmClient> {
    Arc::new(OpenAiClient::new(api_key, base_url, model))
}

/// OpenAI Chat Completions client. Also works with compatible endpoints via
/// a custom base URL.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// Build the JSON request body for the Chat Completions API.
    pub fn build_request_body(&self, request: &CompletionRequest) -> Value {
        json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt }
            ]
        })
    }

    /// Extract the reply text from a Chat Completions response.
    pub fn parse_response(response_body: &Value) -> Result<String, LlmError> {
        let choices = response_body
            .get("choices")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                LlmError::InvalidResponse("missing choices array in response".to_string())
            })?;

        let choice = choices
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("empty choices array".to_string()))?;

        choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(String::from)
            .ok_or_else(|| LlmError::InvalidResponse("choice has no message content".to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = self.build_request_body(request);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider(format!("HTTP request failed: {}", e)))?;

        let response = check_status(response, SPEC.key_var).await?;

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse JSON: {}", e)))?;

        Self::parse_response(&response_body)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
