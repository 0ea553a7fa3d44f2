//! API layer - HTTP routing
//!
//! Collection CRUD is not exposed over HTTP; the router carries the health
//! check and the cross-cutting layers (CORS allow-list, request tracing).

pub mod cors;
pub mod health;
pub mod middleware;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;

pub use cors::cors_layer;
pub use middleware::{ApiError, ApiErrorDetail, AppState};

/// Build the complete router with middleware
///
/// Fails if a configured CORS origin is not a valid header value.
pub fn build_router(state: AppState, cors: &CorsConfig) -> anyhow::Result<Router> {
    let cors = cors_layer(&cors.origins)?;

    Ok(Router::new()
        .nest("/api", health::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
