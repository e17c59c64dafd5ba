//! API error types and HTTP response mapping.

use axum::Json;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::HeaderName;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use keyforge_core::Error as CoreError;

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// Standard JSON error response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message (safe for clients).
    pub message: String,
}

/// HTTP API error with stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    /// Returns an error response for invalid input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Returns an error response for missing resources.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Returns an error response for artifacts a job never produced.
    ///
    /// Same status as `not_found` but a distinct code, so clients can tell
    /// "no such job" from "job exists, artifact was never built".
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "ARTIFACT_NOT_READY", message)
    }

    /// Returns an error response for unreachable dependencies.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", message)
            .with_retry_after(5)
    }

    /// Returns an internal error response.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }

    /// Attaches a Retry-After header value in seconds.
    #[must_use]
    pub const fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_secs = Some(seconds);
        self
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Returns the human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retry_after_secs: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after_secs = self.retry_after_secs;
        let mut response = (
            self.status,
            Json(ApiErrorBody {
                code: self.code.to_string(),
                message: self.message,
            }),
        )
            .into_response();

        if let Some(secs) = retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("retry-after"), value);
            }
        }

        response
    }
}

impl From<CoreError> for ApiError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::Validation { message } => Self::bad_request(message),
            CoreError::NotFound(message) => Self::not_found(message),
            CoreError::NotReady { job_id, artifact } => {
                Self::not_ready(format!("job {job_id} did not produce a {artifact}"))
            }
            CoreError::DependencyUnavailable { message, .. } => Self::unavailable(message),
            // Normally downgraded before reaching callers.
            CoreError::CorruptRecord { .. } => Self::not_found("compile job not found"),
            CoreError::Storage { message, .. }
            | CoreError::Serialization { message }
            | CoreError::Internal { message } => Self::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_carries_retry_after() {
        let error = ApiError::unavailable("queue broker unreachable");
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = error.into_response();
        let retry_after = response
            .headers()
            .get("retry-after")
            .expect("Retry-After header should be present");
        assert_eq!(retry_after.to_str().unwrap(), "5");
    }

    #[test]
    fn not_ready_shares_status_with_not_found_but_not_code() {
        let not_ready = ApiError::from(CoreError::not_ready("j1", "firmware"));
        let not_found = ApiError::from(CoreError::job_not_found("j1"));

        assert_eq!(not_ready.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_ne!(not_ready.code(), not_found.code());
    }

    #[test]
    fn dependency_failure_is_never_a_404() {
        let error = ApiError::from(CoreError::unavailable("redis down"));
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn validation_maps_to_bad_request() {
        let error = ApiError::from(CoreError::validation("keyboard cannot contain separators"));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }
}
