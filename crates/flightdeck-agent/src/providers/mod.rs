// ABOUTME: Provider module aggregating the language-model HTTP adapters.
// ABOUTME: Each sub-module implements LlmClient for one API and describes its environment settings.

pub mod anthropic;
pub mod openai;

use std::env;
use std::sync::Arc;

use crate::llm::{LlmClient, LlmError};

/// A supported provider: its name, the environment variables that configure
/// it, and how to build a client for it.
#[derive(Debug, Clone, Copy)]
pub struct ProviderSpec {
    pub name: &'static str,
    pub key_var: &'static str,
    pub model_var: &'static str,
    pub base_url_var: &'static str,
    pub default_model: &'static str,
    pub default_base_url: &'static str,
    pub connect: fn(String, String, String) -> Arc<dyn LlmClient>,
}

/// Every provider flightdeck can talk to, in reporting order.
pub static ALL: [ProviderSpec; 2] = [anthropic::SPEC, openai::SPEC];

/// Look up a provider by name.
pub fn find(name: &str) -> Option<&'static ProviderSpec> {
    ALL.iter().find(|spec| spec.name == name)
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

impl ProviderSpec {
    pub fn api_key(&self) -> Option<String> {
        non_empty(self.key_var)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Model to use: `explicit` if given, else `<PROVIDER>_MODEL`, else the
    /// provider default.
    pub fn model(&self, explicit: Option<&str>) -> String {
        explicit
            .filter(|m| !m.is_empty())
            .map(String::from)
            .or_else(|| non_empty(self.model_var))
            .unwrap_or_else(|| self.default_model.to_string())
    }

    /// The `<PROVIDER>_BASE_URL` override, if set.
    pub fn base_url_override(&self) -> Option<String> {
        non_empty(self.base_url_var)
    }

    pub fn base_url(&self) -> String {
        self.base_url_override()
            .unwrap_or_else(|| self.default_base_url.to_string())
    }
}

/// Map a non-success HTTP status to an LlmError. `key_var` names the
/// credential to check when the provider rejects the request as unauthorized.
pub(crate) async fn check_status(
    response: reqwest::Response,
    key_var: &str,
) -> Result<reqwest::Response, LlmError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(LlmError::RateLimited);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(LlmError::Unauthorized(format!("check {}", key_var)));
    }

    if status.is_server_error() {
        return Err(LlmError::Provider(format!("Server error: {}", status)));
    }

    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(LlmError::Provider(format!(
            "API error {}: {}",
            status, error_body
        )));
    }

    Ok(response)
}
