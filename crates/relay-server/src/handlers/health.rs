//! `GET /health` (spec §6.1).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::wire::HealthResponse;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        version: state.version.clone(),
    })
}
