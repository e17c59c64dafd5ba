//! Work queue abstraction: the transient status store.
//!
//! This module provides:
//!
//! - [`BuildQueue`]: Trait over the queue broker that holds live job state
//! - [`InMemoryBuildQueue`](memory::InMemoryBuildQueue): in-memory broker
//!   for tests
//! - [`RedisBuildQueue`](redis::RedisBuildQueue): Redis-backed broker for
//!   production
//!
//! The queue is the fresh, authoritative view of a job while the broker
//! retains it; records disappear after retention expires, at which point
//! lookups fall back to the durable record in storage. Only the external
//! worker writes a job's flags; this service is a reader.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use keyforge_core::{JobId, Result};

use crate::request::CompileRequest;
use crate::status::TransientJob;

/// Queue broker abstraction for enqueueing and observing compile jobs.
///
/// Implementations must be safe for concurrent use by many simultaneous
/// requests; handles are shared across the request pool without locks.
#[async_trait]
pub trait BuildQueue: Send + Sync + 'static {
    /// Enqueues a submission and returns the freshly-created job record.
    ///
    /// Mints the job id, stamps `created_at`/`enqueued_at`, and returns
    /// immediately; the build itself happens out-of-band in a worker.
    async fn enqueue(&self, request: &CompileRequest) -> Result<TransientJob>;

    /// Looks up a job's live record.
    ///
    /// Returns `Ok(None)` when the broker no longer knows the id (expired
    /// or never existed); that is a routine outcome, not an error.
    /// Connectivity failures surface as `DependencyUnavailable`.
    async fn fetch(&self, job_id: &JobId) -> Result<Option<TransientJob>>;

    /// Returns the number of jobs waiting for a worker.
    async fn depth(&self) -> Result<usize>;

    /// Returns the last time a worker reported itself alive, if known.
    ///
    /// Used for health reporting only; staleness never blocks a job.
    async fn last_worker_ping(&self) -> Result<Option<DateTime<Utc>>>;

    /// Returns the queue's name or identifier.
    fn queue_name(&self) -> &str;
}
