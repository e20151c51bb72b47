//! Health and configuration status.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// GET /api/health: readiness and active collaborators (no secrets).
async fn get_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "pipelineReady": state.pipeline.is_some(),
        "setupError": state.setup_error,
        "llm": state.llm_config.to_response(),
        "embedder": state.embedder,
        "index": state.index,
        "defaultOptions": state.config.default_options,
    }))
}
