//! Error types and result aliases for Keyforge.
//!
//! This module defines the shared error taxonomy used across all Keyforge
//! components. The variants map directly onto the outcomes callers must
//! distinguish: routine rejections (`Validation`, `NotFound`, `NotReady`),
//! retryable infrastructure failures (`DependencyUnavailable`), and
//! non-retryable corruption (`CorruptRecord`).

use std::fmt;

/// The result type used throughout Keyforge.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Keyforge operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A submission or identifier failed validation before reaching the
    /// queue or storage.
    #[error("validation error: {message}")]
    Validation {
        /// Description of what made the input invalid.
        message: String,
    },

    /// The requested job or object was not found in any store.
    #[error("not found: {0}")]
    NotFound(String),

    /// The job exists but never produced the requested artifact.
    ///
    /// Distinct from [`Error::NotFound`]: a failed compile has a durable
    /// record but no firmware image.
    #[error("artifact not ready: {artifact} for job {job_id}")]
    NotReady {
        /// The job whose artifact was requested.
        job_id: String,
        /// The artifact kind that was never produced.
        artifact: String,
    },

    /// The queue broker or storage backend was unreachable after bounded
    /// retries.
    ///
    /// Never conflated with [`Error::NotFound`]: the caller may retry.
    #[error("dependency unavailable: {message}")]
    DependencyUnavailable {
        /// Description of the connectivity failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A durable record exists but cannot be parsed.
    ///
    /// Never retried (retrying will not fix a malformed record); callers
    /// downgrade it to `NotFound` while logging for operators.
    #[error("corrupt record: {message}")]
    CorruptRecord {
        /// Description of the parse failure.
        message: String,
    },

    /// A storage operation failed for a reason other than connectivity.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new validation error with the given message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a not-found error for a job id.
    #[must_use]
    pub fn job_not_found(job_id: impl fmt::Display) -> Self {
        Self::NotFound(format!("compile job not found: {job_id}"))
    }

    /// Creates a not-ready error for an artifact of a job.
    #[must_use]
    pub fn not_ready(job_id: impl fmt::Display, artifact: impl Into<String>) -> Self {
        Self::NotReady {
            job_id: job_id.to_string(),
            artifact: artifact.into(),
        }
    }

    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a dependency-unavailable error with the given message.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::DependencyUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a dependency-unavailable error with a source cause.
    #[must_use]
    pub fn unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DependencyUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a corrupt-record error with the given message.
    #[must_use]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            message: message.into(),
        }
    }

    /// Returns true if the error is transient and worth retrying locally.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DependencyUnavailable { .. })
    }
}
