//! Survey Intake API Service
//!
//! Accepts survey submissions and appends anonymized records to a log file.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use survey_api::{create_router, AppState, Config};
use survey_core::JsonLinesStore;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "survey_api=debug,survey_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Survey Intake API");

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .ensure_directories()
        .context("Failed to create directories")?;
    info!("Appending submissions to {}", config.log_path.display());

    let store = JsonLinesStore::new(config.log_path.clone());
    let state = AppState::new(Arc::new(store));
    let app = create_router(state);

    let listener = TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("Survey Intake API listening on http://{}", config.api_address());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
