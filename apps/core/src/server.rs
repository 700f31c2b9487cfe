//! HTTP surface: `POST /ask`, `POST /reset`, `GET /health`.

use crate::actors::supervisor::SupervisorHandle;
use crate::models::AskRequest;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::error;

#[derive(Clone)]
pub struct ServerState {
    pub supervisor: SupervisorHandle,
}

pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ask", post(ask_handler))
        .route("/reset", post(reset_handler))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ask_handler(State(state): State<ServerState>, Json(payload): Json<AskRequest>) -> impl IntoResponse {
    match state.supervisor.ask(payload.message).await {
        Ok(answer) => (StatusCode::OK, Json(json!(answer))),
        Err(e) => {
            error!("ask failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

async fn reset_handler(State(state): State<ServerState>) -> impl IntoResponse {
    match state.supervisor.reset_history().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "cleared" }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}
