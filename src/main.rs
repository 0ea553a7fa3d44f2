//! pi-lms - Content backend for a small learning-management system

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pi_lms::{
    api::{self, AppState},
    config::Config,
    db::{self, sync},
    schema::lms_schema,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pi_lms=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting pi-lms...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    if !config.auth.has_secret() {
        tracing::warn!(
            "{} is not set; signing secret is empty",
            pi_lms::config::ENV_SECRET
        );
    }

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    let schema = lms_schema();
    sync::sync_schema(&pool, schema).await?;

    let state = AppState::new(pool.clone(), schema);
    let app = api::build_router(state, &config.cors)?;
    tracing::info!(origins = ?config.cors.origins, "CORS allow-list configured");

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    pool.close().await;
    Ok(())
}
