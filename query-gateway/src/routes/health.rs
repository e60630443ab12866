use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::SharedState;

/// Liveness document.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Queries started but not finished yet.
    pub running_queries: usize,
    /// Queries whose results can still be polled, running or finished.
    pub stored_queries: usize,
}

/// `GET /health`
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let queries = state.queries.lock().await;
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            running_queries: queries.running(),
            stored_queries: queries.len(),
        }),
    )
}
