// ABOUTME: Factory function for creating LLM clients from a provider name and environment.
// ABOUTME: Resolves provider name + optional model into a configured Arc<dyn LlmClient>.

use std::sync::Arc;

use crate::llm::LlmClient;
use crate::providers;

/// Create an LLM client for the given provider name.
///
/// The model is resolved from:
/// 1. The explicit `model` parameter (if Some)
/// 2. A provider-specific environment variable (e.g. ANTHROPIC_MODEL)
/// 3. A sensible default for that provider
///
/// The base URL comes from `<PROVIDER>_BASE_URL` when set.
pub fn create_llm_client(
    provider: &str,
    model: Option<&str>,
) -> Result<Arc<dyn LlmClient>, anyhow::Error> {
    let spec = providers::find(provider)
        .ok_or_else(|| anyhow::anyhow!("unsupported LLM provider: {}", provider))?;
    let api_key = spec
        .api_key()
        .ok_or_else(|| anyhow::anyhow!("{} environment variable not set", spec.key_var))?;
    Ok((spec.connect)(api_key, spec.base_url(), spec.model(model)))
}
