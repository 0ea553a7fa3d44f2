//! Health check

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub collections: Vec<&'static str>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// GET /api/health - 200 when the database answers, 503 otherwise
async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    if let Err(e) = state.pool.ping().await {
        tracing::warn!("Health check failed: {:#}", e);
        return Err(ApiError::unavailable("Database unavailable"));
    }

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        collections: state.schema.slugs(),
    }))
}
