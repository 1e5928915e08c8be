// ABOUTME: HTTP server for flightdeck, exposing the chat orchestrator over a small JSON API.
// ABOUTME: Uses Axum with shared state holding the orchestrator, session store and provider status.

pub mod api;
pub mod app_state;
pub mod config;
pub mod providers;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, FlightdeckConfig};
pub use providers::{ProviderInfo, ProviderStatus};
pub use routes::create_router;
