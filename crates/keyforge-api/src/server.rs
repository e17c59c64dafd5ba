//! API server implementation.
//!
//! Provides health, ready, and compile endpoints over the orchestrator.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use keyforge_compile::{ArtifactResolver, BuildQueue, Orchestrator};
use keyforge_core::{Result, StorageBackend};

use crate::config::{Config, CorsConfig};

// ============================================================================
// Health and Ready Responses
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all request handlers.
///
/// Holds only stateless handles; the queue and storage clients are safe
/// for concurrent use across the request pool.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// The job orchestrator.
    pub orchestrator: Orchestrator,
    /// The artifact resolver.
    pub resolver: ArtifactResolver,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates application state over the given queue and storage handles.
    #[must_use]
    pub fn new(
        config: Config,
        queue: Arc<dyn BuildQueue>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        let orchestrator = Orchestrator::new(queue, Arc::clone(&storage))
            .with_liveness_window(config.check_timeout());
        let resolver = ArtifactResolver::new(storage);
        Self {
            config,
            orchestrator,
            resolver,
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. This is a shallow check that
/// doesn't verify dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// Verifies the queue broker answers; a degraded worker does not make the
/// API unready, an unreachable broker does.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.orchestrator.service_status().await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("queue broker check failed: {e}")),
            }),
        ),
    }
}

// ============================================================================
// Server
// ============================================================================

/// The Keyforge API server.
pub struct Server {
    config: Config,
    queue: Arc<dyn BuildQueue>,
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("queue", &self.queue.queue_name())
            .field("storage", &"<StorageBackend>")
            .finish()
    }
}

impl Server {
    /// Creates a new server over the given queue and storage handles.
    #[must_use]
    pub fn new(
        config: Config,
        queue: Arc<dyn BuildQueue>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            config,
            queue,
            storage,
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the router with all routes and middleware.
    #[must_use]
    pub fn create_router(&self) -> Router {
        let state = Arc::new(AppState::new(
            self.config.clone(),
            Arc::clone(&self.queue),
            Arc::clone(&self.storage),
        ));

        let cors = Self::build_cors_layer(&self.config.cors);

        Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
            .nest("/v1", crate::routes::v1_routes())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Binds the HTTP listener and serves until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or the server fails.
    pub async fn serve(&self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            keyforge_core::Error::unavailable_with_source(format!("failed to bind {addr}"), e)
        })?;

        tracing::info!(addr = %addr, "keyforge-api listening");

        axum::serve(listener, self.create_router())
            .await
            .map_err(|e| {
                keyforge_core::Error::unavailable_with_source("http server failed", e)
            })
    }

    fn build_cors_layer(cors_config: &CorsConfig) -> CorsLayer {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION])
            .max_age(Duration::from_secs(cors_config.max_age_seconds));

        if cors_config.allowed_origins.len() == 1
            && cors_config.allowed_origins.first().is_some_and(|o| o == "*")
        {
            return cors.allow_origin(Any);
        }

        let origins: Vec<HeaderValue> = cors_config
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}
