// ABOUTME: Chat API handlers: run one orchestrated turn, and clear a session's history.
// ABOUTME: Maps turn outcomes onto HTTP status codes while always returning the JSON response body.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flightdeck_agent::TurnOutcome;
use flightdeck_core::{ChatRequest, TurnPhase};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::SharedState;

/// Request body for clearing a session.
#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    pub session_id: String,
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// HTTP status for a finished turn.
pub fn status_for(outcome: &TurnOutcome) -> StatusCode {
    match outcome {
        TurnOutcome::Completed => StatusCode::OK,
        TurnOutcome::Rejected(_) => StatusCode::BAD_REQUEST,
        TurnOutcome::Failed {
            phase: TurnPhase::Planning,
            ..
        } => StatusCode::INTERNAL_SERVER_ERROR,
        TurnOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
    }
}

/// POST /chat - Answer a natural-language question about the flights data.
pub async fn chat(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "malformed chat request");
            return bad_request(rejection.body_text());
        }
    };

    let report = state.orchestrator.handle(&state.sessions, request).await;
    (status_for(&report.outcome), Json(report.response)).into_response()
}

/// POST /clear - Discard a session and all of its history.
pub async fn clear(
    State(state): State<SharedState>,
    payload: Result<Json<ClearRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let session_id = request.session_id.as_str();
    if session_id.trim().is_empty() {
        return bad_request("session_id is required".to_string());
    }

    match state.sessions.clear(session_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "cleared", "session_id": session_id })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": e.to_string(), "session_id": session_id })),
        )
            .into_response(),
    }
}
