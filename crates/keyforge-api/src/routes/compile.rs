//! Compile job routes.
//!
//! ## Routes
//!
//! - `POST /v1/compile` - Enqueue a compile job
//! - `GET /v1/compile/{job_id}` - Fetch normalized job status
//! - `GET /v1/compile/{job_id}/download` - Download the firmware image
//! - `GET /v1/compile/{job_id}/hex` - Deprecated alias for `/download`
//! - `GET /v1/compile/{job_id}/keymap` - Download the keymap archive
//! - `GET /v1/compile/{job_id}/source` - Download the source archive
//!
//! Artifact downloads either redirect to a public URL (bucket storage) or
//! stream the bytes directly (filesystem storage), depending on which
//! capability the active driver supports.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::Value;

use keyforge_compile::{ArtifactKind, ResolvedArtifact};
use keyforge_core::JobId;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Response body for a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// Always true; failed submissions return an error body instead.
    pub enqueued: bool,
    /// The minted job id to poll.
    pub job_id: JobId,
}

/// Builds the compile route table.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/compile", post(submit))
        .route("/compile/{job_id}", get(job_status))
        .route("/compile/{job_id}/download", get(download_firmware))
        .route("/compile/{job_id}/hex", get(download_firmware))
        .route("/compile/{job_id}/keymap", get(download_keymap))
        .route("/compile/{job_id}/source", get(download_source))
}

/// Enqueues a compile job.
async fn submit(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<SubmitResponse>> {
    let job_id = state.orchestrator.submit(&payload).await?;
    Ok(Json(SubmitResponse {
        enqueued: true,
        job_id,
    }))
}

/// Fetches the normalized status of a compile job.
async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job_id = parse_job_id(&job_id)?;
    let report = state.orchestrator.status(&job_id).await?;
    Ok(Json(report).into_response())
}

async fn download_firmware(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    download(&state, &job_id, ArtifactKind::Firmware).await
}

async fn download_keymap(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    download(&state, &job_id, ArtifactKind::Keymap).await
}

async fn download_source(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    download(&state, &job_id, ArtifactKind::Source).await
}

async fn download(state: &AppState, job_id: &str, kind: ArtifactKind) -> ApiResult<Response> {
    let job_id = parse_job_id(job_id)?;
    let resolved = state.resolver.resolve(&job_id, kind).await?;

    match resolved {
        ResolvedArtifact::Redirect { url } => Ok(Redirect::temporary(&url).into_response()),
        ResolvedArtifact::Stream { stream, filename } => {
            let mut response = Body::from_stream(stream).into_response();

            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            if let Ok(value) =
                HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
            {
                response
                    .headers_mut()
                    .insert(header::CONTENT_DISPOSITION, value);
            }

            Ok(response)
        }
    }
}

/// Parses a path-supplied job id.
///
/// An id that fails the safe-charset check cannot exist in either store,
/// so it reads as a missing job rather than a malformed request.
fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("compile job not found: {raw}")))
}
