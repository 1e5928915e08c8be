// ABOUTME: Tool listing handler exposing the registered tools' declared schemas.
// ABOUTME: Lets callers discover what the orchestrator can do and what each tool consumes and produces.

use axum::Json;
use axum::extract::State;
use flightdeck_core::ToolSchema;

use crate::app_state::SharedState;

/// GET /api/tools - Schemas of every registered tool.
pub async fn list_tools(State(state): State<SharedState>) -> Json<Vec<ToolSchema>> {
    Json(state.orchestrator.registry().list())
}
