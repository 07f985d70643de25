//! Survey Intake API
//!
//! HTTP transport for the survey submission pipeline.
//!
//! ## Endpoints
//!
//! - `GET /ping` - Liveness check with current UTC time
//! - `POST /v1/survey` - Submit a survey response

pub mod config;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::Config;
pub use handlers::{AppState, Clock};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/ping", get(handlers::ping_handler))
        .route("/v1/survey", post(handlers::submit_survey_handler))
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
