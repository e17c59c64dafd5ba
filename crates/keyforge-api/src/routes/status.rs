//! Service status routes.
//!
//! ## Routes
//!
//! - `GET /v1` - API status: queue depth, worker liveness, version
//! - `GET /v1/healthcheck` - Same view, for operators
//!
//! The status verdict is advisory: a degraded verdict means workers have
//! gone quiet, not that submissions are refused.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;

use keyforge_compile::ServiceHealth;

use crate::error::ApiResult;
use crate::server::AppState;

/// API status response body.
#[derive(Debug, Serialize)]
pub struct ApiStatus {
    /// Health verdict derived from worker liveness.
    pub status: ServiceHealth,
    /// Number of jobs waiting for a worker.
    pub queue_length: usize,
    /// Last time a worker reported itself alive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ping: Option<DateTime<Utc>>,
    /// Server version.
    pub version: &'static str,
}

/// Builds the status route table.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api_status))
        .route("/healthcheck", get(api_status))
}

/// Returns the service status view.
async fn api_status(State(state): State<Arc<AppState>>) -> ApiResult<Json<ApiStatus>> {
    let status = state.orchestrator.service_status().await?;

    Ok(Json(ApiStatus {
        status: status.status,
        queue_length: status.queue_length,
        last_ping: status.last_ping,
        version: env!("CARGO_PKG_VERSION"),
    }))
}
