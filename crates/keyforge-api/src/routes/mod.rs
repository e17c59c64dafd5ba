//! HTTP route handlers.

pub mod compile;
pub mod status;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// `/v1` routes.
pub fn v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(status::routes())
        .merge(compile::routes())
}
