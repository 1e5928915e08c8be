// ABOUTME: Shared application state for the flightdeck HTTP server.
// ABOUTME: Holds the orchestrator, the in-memory session store and the detected provider status.

use std::sync::Arc;

use flightdeck_agent::{LlmClient, Orchestrator, RegistryError, standard_registry};
use flightdeck_core::SessionStore;
use flightdeck_store::FlightsDb;

use crate::config::FlightdeckConfig;
use crate::providers::ProviderStatus;

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub sessions: SessionStore,
    pub provider_status: ProviderStatus,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        orchestrator: Orchestrator,
        sessions: SessionStore,
        provider_status: ProviderStatus,
    ) -> Self {
        Self {
            orchestrator,
            sessions,
            provider_status,
        }
    }

    /// Wire the standard tools against the configured database and the
    /// given language model.
    pub fn from_config(
        config: &FlightdeckConfig,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self, RegistryError> {
        let db = FlightsDb::new(&config.db_path, config.max_rows, config.sql_timeout);
        let registry = standard_registry(llm, db, config.enable_analysis)?;
        tracing::info!(
            tools = ?registry.names(),
            db = %config.db_path.display(),
            "tool registry ready"
        );
        Ok(Self::new(
            Orchestrator::new(Arc::new(registry), config.orchestrator_config()),
            SessionStore::new(config.max_history_turns),
            ProviderStatus::with_default(
                config.default_provider.clone(),
                config.default_model.clone(),
            ),
        ))
    }
}
