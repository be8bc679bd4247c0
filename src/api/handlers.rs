//! Request handlers for the HTTP API.

use super::{ApiError, AppState};
use crate::error::SpolError;
use crate::search::QueryResult;
use crate::session::SessionStatus;
use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Multipart, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Name of the multipart field carrying the video.
const VIDEO_FIELD: &str = "video";

// === Request/Response Types ===

#[derive(Serialize)]
pub(super) struct UploadResponse {
    message: &'static str,
    segments_count: usize,
    video_filename: String,
    duration: String,
    video_url: String,
    version: u64,
}

#[derive(Serialize)]
pub(super) struct StatusResponse {
    status: &'static str,
    has_transcription: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    segments_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processed_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub(super) struct SearchRequest {
    query: Option<String>,
    top_k: Option<usize>,
}

#[derive(Serialize)]
pub(super) struct TranscriptResponse {
    transcript: String,
}

#[derive(Deserialize)]
pub(super) struct DescribeRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    results: Vec<QueryResult>,
}

#[derive(Serialize)]
pub(super) struct DescribeResponse {
    description: String,
}

#[derive(Deserialize)]
pub(super) struct AskRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    context: String,
}

#[derive(Serialize)]
pub(super) struct AskResponse {
    answer: String,
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|e| SpolError::InvalidInput(e.body_text()).into())
}

// === Handlers ===

pub(super) async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub(super) async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let response = match state.pipeline.status() {
        SessionStatus::Empty => StatusResponse {
            status: "ready",
            has_transcription: false,
            segments_count: None,
            video_filename: None,
            version: None,
            processed_at: None,
        },
        SessionStatus::Ready {
            version,
            segments_count,
            video_filename,
            created_at,
        } => StatusResponse {
            status: "ready",
            has_transcription: true,
            segments_count: Some(segments_count),
            video_filename: Some(video_filename),
            version: Some(version),
            processed_at: Some(created_at),
        },
    };
    Json(response)
}

pub(super) async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadResponse> {
    let pipeline = &state.pipeline;
    let server = &pipeline.settings().server;
    let (max_bytes, limit_mb) = (server.max_upload_bytes, server.max_upload_mb());

    let mut multipart = multipart.map_err(|e| {
        debug!("Rejected upload body: {}", e);
        SpolError::MissingFile
    })?;

    let permit = pipeline.try_begin_upload()?;

    let pending = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, limit_mb))?
            .ok_or(SpolError::MissingFile)?;

        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let pending = pipeline.prepare_upload(field.file_name().unwrap_or_default())?;
        if let Err(e) = save_field(field, &pending.path, max_bytes, limit_mb).await {
            tokio::fs::remove_file(&pending.path).await.ok();
            return Err(e.into());
        }
        break pending;
    };

    info!("Video file '{}' has been uploaded", pending.filename);

    let outcome = pipeline.process_upload(permit, pending).await?;

    Ok(Json(UploadResponse {
        message: "Transcription completed",
        segments_count: outcome.segments_count,
        video_filename: outcome.video_filename,
        duration: outcome.duration,
        video_url: format!("/video/{}", outcome.stored_name),
        version: outcome.version,
    }))
}

/// Stream a multipart field to disk, enforcing the size ceiling.
async fn save_field(
    mut field: Field<'_>,
    path: &Path,
    max_bytes: u64,
    limit_mb: u64,
) -> Result<u64, SpolError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, limit_mb))?
    {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(SpolError::FileTooLarge { limit_mb });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    debug!("Stored {} bytes at {}", written, path.display());
    Ok(written)
}

fn multipart_error(err: MultipartError, limit_mb: u64) -> SpolError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        SpolError::FileTooLarge { limit_mb }
    } else {
        SpolError::InvalidInput(err.body_text())
    }
}

pub(super) async fn search(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Vec<QueryResult>> {
    state.pipeline.sessions().require()?;
    let req = json_body(body)?;

    let query = req
        .query
        .ok_or_else(|| SpolError::InvalidInput("No query provided".to_string()))?;

    let results = state.pipeline.search(&query, req.top_k).await?;
    Ok(Json(results))
}

pub(super) async fn transcript(State(state): State<Arc<AppState>>) -> ApiResult<TranscriptResponse> {
    let transcript = state.pipeline.full_transcript()?;
    Ok(Json(TranscriptResponse { transcript }))
}

pub(super) async fn describe(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DescribeRequest>, JsonRejection>,
) -> ApiResult<DescribeResponse> {
    state.pipeline.sessions().require()?;
    let req = json_body(body)?;

    let description = state.pipeline.describe(&req.query, &req.results).await?;
    Ok(Json(DescribeResponse { description }))
}

pub(super) async fn ask(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> ApiResult<AskResponse> {
    state.pipeline.sessions().require()?;
    let req = json_body(body)?;

    let answer = state.pipeline.ask(&req.question, &req.context).await?;
    Ok(Json(AskResponse { answer }))
}
