//! HTTP API for uploading a video and querying its transcript.
//!
//! All endpoints speak JSON. Errors are returned as `{error, kind}` with a
//! status code chosen from the error's category.

mod handlers;

use crate::error::{ErrorCategory, SpolError};
use crate::pipeline::Pipeline;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, warn};

/// Shared application state.
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Arc<Self> {
        Arc::new(Self { pipeline })
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let server = &state.pipeline.settings().server;
    let body_limit = usize::try_from(server.max_upload_bytes).unwrap_or(usize::MAX);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let videos = ServeDir::new(state.pipeline.upload_dir());

    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route(
            "/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/search", post(handlers::search))
        .route("/transcript", get(handlers::transcript))
        .route("/get_full_transcript", get(handlers::transcript))
        .route("/describe", post(handlers::describe))
        .route("/ask", post(handlers::ask))
        .route("/gpt2_ask", post(handlers::ask))
        .nest_service("/video", videos)
        .layer(cors)
        .with_state(state)
}

/// Status code for an error returned by the API.
pub fn status_for(err: &SpolError) -> StatusCode {
    match err {
        SpolError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        SpolError::Busy => StatusCode::CONFLICT,
        SpolError::SummarizerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        SpolError::Summarization(_) => StatusCode::BAD_GATEWAY,
        other => match other.category() {
            ErrorCategory::Input => StatusCode::BAD_REQUEST,
            ErrorCategory::Collaborator => StatusCode::BAD_GATEWAY,
            ErrorCategory::Pipeline | ErrorCategory::Search | ErrorCategory::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

/// Error wrapper that renders as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub SpolError);

impl From<SpolError> for ApiError {
    fn from(err: SpolError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = match self.0.category() {
            ErrorCategory::Internal => format!("Processing failed: {}", self.0),
            _ => self.0.to_string(),
        };

        if status.is_server_error() {
            error!(kind = self.0.kind(), "{}", message);
        } else {
            warn!(kind = self.0.kind(), "{}", message);
        }

        (
            status,
            Json(ErrorResponse {
                error: message,
                kind: self.0.kind(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(status_for(&SpolError::MissingFile), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&SpolError::NoSession), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&SpolError::FileTooLarge { limit_mb: 500 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(status_for(&SpolError::Busy), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&SpolError::NoSegments),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&SpolError::Summarization("down".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&SpolError::SummarizerUnavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
