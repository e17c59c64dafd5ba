//! Bounded retry with exponential backoff.
//!
//! Network calls to the queue broker and storage backend retry transient
//! connectivity errors a fixed number of times before surfacing the failure.
//! Only [`Error::DependencyUnavailable`] is retried; routine outcomes
//! (`NotFound`, `Validation`) and non-retryable corruption pass through on
//! the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

const MAX_ATTEMPTS: usize = 3;
const BASE_BACKOFF_MS: u64 = 50;
const MAX_BACKOFF_MS: u64 = 500;

/// Runs `operation`, retrying transient connectivity failures.
///
/// Backoff doubles per attempt from 50ms, capped at 500ms.
///
/// # Errors
///
/// Returns the last error once attempts are exhausted, or immediately for
/// non-retryable errors.
pub async fn with_backoff<T, F, Fut>(op: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                let exponent = u32::try_from(attempt - 1).unwrap_or(u32::MAX);
                let backoff_ms = BASE_BACKOFF_MS
                    .saturating_mul(2_u64.saturating_pow(exponent))
                    .min(MAX_BACKOFF_MS);

                tracing::debug!(
                    op = op,
                    attempt = attempt,
                    backoff_ms = backoff_ms,
                    "transient failure, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
            Err(err) => return Err(err),
        }
    }
}
