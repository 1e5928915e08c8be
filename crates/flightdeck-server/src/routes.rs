// ABOUTME: Route definitions for the flightdeck HTTP API.
// ABOUTME: Assembles all routes into a single Axum Router with shared state, CORS and request tracing.

use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(api::chat::chat))
        .route("/clear", post(api::chat::clear))
        .route("/api/tools", get(api::tools::list_tools))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler. Reports liveness and which providers are configured.
async fn health(State(state): State<SharedState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "providers": state.provider_status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use crate::providers::ProviderStatus;
    use axum::body::Body;
    use flightdeck_agent::testing::FnTool;
    use flightdeck_agent::{Orchestrator, OrchestratorConfig, ToolRegistry};
    use flightdeck_core::{ErrorKind, SessionStore, ToolName};
    use http::Request;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state_with(execute: FnTool) -> SharedState {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(FnTool::ok(
                ToolName::GenerateSql,
                json!({
                    "sql_query": "SELECT origin, COUNT(*) AS flights FROM flights GROUP BY origin"
                }),
            )))
            .unwrap();
        registry.register(Arc::new(execute)).unwrap();
        registry
            .register(Arc::new(FnTool::ok(
                ToolName::SuggestFollowUps,
                json!({ "questions": ["Which origin has the longest delays?"] }),
            )))
            .unwrap();
        let orchestrator = Orchestrator::new(Arc::new(registry), OrchestratorConfig::default());
        Arc::new(AppState::new(
            orchestrator,
            SessionStore::default(),
            ProviderStatus::with_default("anthropic".to_string(), None),
        ))
    }

    fn test_state() -> SharedState {
        state_with(FnTool::ok(
            ToolName::ExecuteSql,
            json!({
                "rows": [
                    { "origin": "EWR", "flights": 120835 },
                    { "origin": "JFK", "flights": 111279 }
                ],
                "row_count": 2,
                "summary": { "row_count": 2 }
            }),
        ))
    }

    async fn send(app: Router, request: Request<Body>) -> (u16, Value) {
        let resp = app.oneshot(request).await.unwrap();
        let status = resp.status().as_u16();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (status, json) = send(
            create_router(test_state()),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["providers"]["default_provider"], "anthropic");
    }

    #[tokio::test]
    async fn chat_returns_full_response() {
        let (status, json) = send(
            create_router(test_state()),
            post_json("/chat", json!({ "query": "Flights per origin airport" })),
        )
        .await;

        assert_eq!(status, 200);
        assert!(!json["session_id"].as_str().unwrap().is_empty());
        assert!(json["sql_query"].as_str().unwrap().contains("GROUP BY origin"));
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
        assert_eq!(json["data"][0]["origin"], "EWR");
        assert_eq!(json["follow_up_questions"].as_array().unwrap().len(), 1);
        assert!(json.get("error").is_none());
        assert!(json.get("visualization").is_none());
    }

    #[tokio::test]
    async fn empty_query_is_bad_request_with_session_id() {
        let (status, json) = send(
            create_router(test_state()),
            post_json("/chat", json!({ "query": "", "session_id": "abc" })),
        )
        .await;

        assert_eq!(status, 400);
        assert_eq!(json["session_id"], "abc");
        assert!(json["error"].as_str().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let (status, json) = send(
            create_router(test_state()),
            Request::post("/chat")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;

        assert_eq!(status, 400);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn fatal_execution_failure_is_bad_gateway() {
        let state = state_with(FnTool::failing(
            ToolName::ExecuteSql,
            ErrorKind::Backend,
            "database unavailable",
        ));
        let (status, json) = send(
            create_router(state),
            post_json("/chat", json!({ "query": "Flights per origin", "session_id": "s-1" })),
        )
        .await;

        assert_eq!(status, 502);
        assert_eq!(json["session_id"], "s-1");
        assert!(json["error"].as_str().unwrap().contains("database unavailable"));
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn clear_discards_history_then_reports_unknown() {
        let state = test_state();

        let (status, _) = send(
            create_router(state.clone()),
            post_json("/chat", json!({ "query": "Flights per origin", "session_id": "s-2" })),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(state.sessions.history("s-2").await.unwrap().len(), 1);

        let (status, json) = send(
            create_router(state.clone()),
            post_json("/clear", json!({ "session_id": "s-2" })),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["status"], "cleared");
        assert_eq!(json["session_id"], "s-2");
        assert!(!state.sessions.contains("s-2").await);

        let (status, json) = send(
            create_router(state),
            post_json("/clear", json!({ "session_id": "s-2" })),
        )
        .await;
        assert_eq!(status, 404);
        assert!(json["error"].as_str().unwrap().contains("unknown session"));
    }

    #[tokio::test]
    async fn padded_session_id_is_used_verbatim() {
        let state = test_state();

        let (status, json) = send(
            create_router(state.clone()),
            post_json("/chat", json!({ "query": "Flights per origin", "session_id": " s-3 " })),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["session_id"], " s-3 ");
        assert!(state.sessions.contains(" s-3 ").await);

        let (status, _) = send(
            create_router(state.clone()),
            post_json("/clear", json!({ "session_id": "s-3" })),
        )
        .await;
        assert_eq!(status, 404);

        let (status, json) = send(
            create_router(state.clone()),
            post_json("/clear", json!({ "session_id": " s-3 " })),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["session_id"], " s-3 ");
        assert!(state.sessions.is_empty().await);
    }

    #[tokio::test]
    async fn clear_requires_session_id() {
        let (status, _) = send(create_router(test_state()), post_json("/clear", json!({}))).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn tools_endpoint_lists_registered_schemas() {
        let (status, json) = send(
            create_router(test_state()),
            Request::get("/api/tools").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, 200);
        let names: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["generate_sql", "execute_sql", "suggest_follow_ups"]);
    }
}
