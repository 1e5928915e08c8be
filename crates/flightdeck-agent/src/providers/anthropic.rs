// ABOUTME: Anthropic Claude API adapter implementing the LlmClient trait.
// ABOUTME: Sends one system + user prompt to the Messages API and joins the text blocks of the reply.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::providers::{ProviderSpec, check_status};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

pub const SPEC: ProviderSpec = ProviderSpec {
    name: "anthropic",
    key_var: "ANTHROPIC_API_KEY",
    model_var: "ANTHROPIC_MODEL",
    base_url_var: "ANTHROPIC_BASE_URL",
    default_model: DEFAULT_MODEL,
    default_base_url: DEFAULT_BASE_URL,
    connect,
};

fn connect(api_key: String, base_url: String, model: String) -> Arc<dyn LlmClient> {
    Arc::new(AnthropicClient::new(api_key, base_url, model))
}
const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    /// Create a new AnthropicClient with explicit configuration.
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// Build the JSON request body for the Messages API.
    pub fn build_request_body(&self, request: &CompletionRequest) -> Value {
        json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": [
                { "role": "user", "content": request.prompt }
            ]
        })
    }

    /// Extract the reply text from a Messages API response.
    pub fn parse_response(response_body: &Value) -> Result<String, LlmError> {
        let content = response_body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                LlmError::InvalidResponse("missing content array in response".to_string())
            })?;

        let text: Vec<&str> = content
            .iter()
            .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect();

        if text.is_empty() {
            return Err(LlmError::InvalidResponse(
                "no text content in response".to_string(),
            ));
        }

        Ok(text.join(""))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = self.build_request_body(request);
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
