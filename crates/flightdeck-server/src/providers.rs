// ABOUTME: Reports which language-model providers are usable, for the health endpoint and startup checks.
// ABOUTME: Built from the agent's provider list; API keys are only checked for presence.

use flightdeck_agent::providers::{self, ProviderSpec};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub has_api_key: bool,
    pub model: String,
    /// Only set when the provider's base URL is overridden.
    pub base_url: Option<String>,
}

impl ProviderInfo {
    fn from_spec(spec: &ProviderSpec) -> Self {
        Self {
            name: spec.name.to_string(),
            has_api_key: spec.has_api_key(),
            model: spec.model(None),
            base_url: spec.base_url_override(),
        }
    }
}

/// Provider availability as seen at startup, with the provider and model
/// the server was configured to use.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub default_provider: String,
    pub default_model: Option<String>,
    pub providers: Vec<ProviderInfo>,
    pub any_available: bool,
}

impl ProviderStatus {
    pub fn with_default(default_provider: String, default_model: Option<String>) -> Self {
        let providers: Vec<ProviderInfo> =
            providers::ALL.iter().map(ProviderInfo::from_spec).collect();
        let any_available = providers.iter().any(|p| p.has_api_key);
        Self {
            default_provider,
            default_model,
            providers,
            any_available,
        }
    }

    /// True when the default provider is known and has a key configured.
    pub fn default_available(&self) -> bool {
        self.get(&self.default_provider)
            .is_some_and(|p| p.has_api_key)
    }

    pub fn get(&self, name: &str) -> Option<&ProviderInfo> {
        self.providers.iter().find(|p| p.name == name)
    }
}
