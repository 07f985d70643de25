//! API request handlers for survey intake

use axum::{
    body::Bytes,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header::CONTENT_TYPE, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use survey_core::{PipelineError, RecordStore, SubmissionPipeline, ValidationErrors};
use tracing::{error, info};

/// Source of the current time
pub type Clock = fn() -> DateTime<Utc>;

/// Shared application state
pub struct AppState {
    pub pipeline: SubmissionPipeline,
    pub clock: Clock,
}

impl AppState {
    /// Create state appending to `store`, using the system clock
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            pipeline: SubmissionPipeline::new(store),
            clock: Utc::now,
        }
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiError {
    pub fn invalid_json() -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            body: json!({
                "error": "invalid_json",
                "detail": "Body must be application/json"
            }),
        }
    }

    pub fn validation(errors: ValidationErrors) -> Self {
        ApiError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: json!({
                "error": "validation_error",
                "detail": errors
            }),
        }
    }

    pub fn storage() -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({
                "error": "storage_error",
                "detail": "Failed to persist submission"
            }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::MalformedInput => ApiError::invalid_json(),
            PipelineError::ValidationFailed(errors) => ApiError::validation(errors),
            PipelineError::StorageFailed(e) => {
                error!("Submission could not be stored: {}", e);
                ApiError::storage()
            }
        }
    }
}

/// Best-effort client address: `X-Forwarded-For`, then the peer address,
/// then empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let addr = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(peer)| peer.ip().to_string())
            })
            .unwrap_or_default();

        Ok(ClientAddr(addr))
    }
}

/// Health check endpoint
pub async fn ping_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "API is alive",
        "utc_time": (state.clock)().to_rfc3339()
    }))
}

/// Accept one survey submission
pub async fn submit_survey_handler(
    State(state): State<Arc<AppState>>,
    ClientAddr(client_addr): ClientAddr,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if !is_json_content_type(&headers) {
        info!("Rejected submission without a JSON content type");
        return Err(ApiError::invalid_json());
    }

    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        info!("Rejected unparseable submission body: {}", e);
        ApiError::invalid_json()
    })?;

    let now = (state.clock)();
    let client_addr = Some(client_addr.as_str()).filter(|addr| !addr.is_empty());
    state.pipeline.handle(payload, now, client_addr).await?;

    Ok((StatusCode::CREATED, Json(json!({ "status": "ok" }))))
}

/// `application/json` or any `application/*+json` media type
fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}
