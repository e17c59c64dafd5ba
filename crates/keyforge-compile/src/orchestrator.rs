//! The job orchestrator.
//!
//! Accepts submissions, enqueues them, and reconciles the two sources of
//! job truth into one normalized view:
//!
//! 1. The transient queue record: fresh and authoritative while the
//!    broker retains the job.
//! 2. The worker-flushed durable record: authoritative after the
//!    transient record expires.
//!
//! The fallback is a first-class code path, not an afterthought: brokers
//! drop finished jobs after retention, and clients keep polling long after
//! that. A job whose worker crashed before flushing a durable record
//! becomes permanently unobservable; that is an accepted limitation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use keyforge_core::{JobId, Result, StorageBackend, retry};

use crate::queue::BuildQueue;
use crate::record::fetch_record;
use crate::request::CompileRequest;
use crate::status::{JobStatus, StatusReport};

const DEFAULT_LIVENESS_WINDOW: Duration = Duration::from_secs(300);

/// Overall service health as derived from worker liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    /// Workers are alive and pinging.
    Running,
    /// No recent worker ping; jobs may sit in the queue.
    Degraded,
}

/// Operator-facing service status view.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    /// Health verdict derived from the last worker ping.
    pub status: ServiceHealth,
    /// Number of jobs waiting for a worker.
    pub queue_length: usize,
    /// Last time a worker reported itself alive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ping: Option<DateTime<Utc>>,
}

/// Accepts submissions and serves normalized job status.
///
/// Holds only stateless handles to the queue and storage clients; safe to
/// share across the request pool.
#[derive(Clone)]
pub struct Orchestrator {
    queue: Arc<dyn BuildQueue>,
    storage: Arc<dyn StorageBackend>,
    liveness_window: Duration,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("queue", &self.queue.queue_name())
            .field("storage", &"<StorageBackend>")
            .field("liveness_window", &self.liveness_window)
            .finish()
    }
}

impl Orchestrator {
    /// Creates an orchestrator over the given queue and storage handles.
    #[must_use]
    pub fn new(queue: Arc<dyn BuildQueue>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            queue,
            storage,
            liveness_window: DEFAULT_LIVENESS_WINDOW,
        }
    }

    /// Overrides the window after which a silent worker marks the service
    /// degraded. Advisory only: it affects health reporting, never job
    /// execution.
    #[must_use]
    pub const fn with_liveness_window(mut self, window: Duration) -> Self {
        self.liveness_window = window;
        self
    }

    /// Returns the storage handle shared with the artifact resolver.
    #[must_use]
    pub fn storage(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.storage)
    }

    /// Validates a raw submission and enqueues it.
    ///
    /// Returns the minted job id immediately; the build happens
    /// out-of-band. Submissions with unsafe identifiers are rejected
    /// before anything reaches the queue.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed or unsafe submissions, or
    /// `DependencyUnavailable` if the queue stayed unreachable through
    /// retries.
    pub async fn submit(&self, payload: &Value) -> Result<JobId> {
        let mut request = CompileRequest::from_value(payload)?;
        request.ensure_documentation();

        let job = retry::with_backoff("queue.enqueue", || self.queue.enqueue(&request)).await?;

        tracing::info!(
            job_id = %job.id,
            keyboard = %request.keyboard,
            keymap = %request.keymap,
            "compile job enqueued"
        );

        Ok(job.id)
    }

    /// Returns the normalized status view for a job.
    ///
    /// Reads the transient store first; falls back to the durable record
    /// when the broker no longer knows the id. Exactly one self-consistent
    /// view is returned per call.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when neither store has a record (including the
    /// corrupt-record downgrade), or `DependencyUnavailable` when a
    /// dependency stayed unreachable through retries; never conflated
    /// with `NotFound`.
    pub async fn status(&self, job_id: &JobId) -> Result<StatusReport> {
        let transient =
            retry::with_backoff("queue.fetch", || self.queue.fetch(job_id)).await?;

        if let Some(job) = transient {
            let report = StatusReport::from_transient(&job);
            if report.status == JobStatus::Unknown {
                tracing::error!(
                    job_id = %job_id,
                    "queue reported all flags false for a known job"
                );
            }
            return Ok(report);
        }

        let (record, raw) = fetch_record(self.storage.as_ref(), job_id).await?;
        Ok(StatusReport::from_durable(&record, raw))
    }

    /// Returns the operator-facing service status.
    ///
    /// The service is degraded when no worker has pinged within the
    /// liveness window.
    ///
    /// # Errors
    ///
    /// Returns `DependencyUnavailable` if the queue broker is unreachable.
    pub async fn service_status(&self) -> Result<ServiceStatus> {
        let queue_length =
            retry::with_backoff("queue.depth", || self.queue.depth()).await?;
        let last_ping = self.queue.last_worker_ping().await?;

        let fresh = last_ping.is_some_and(|at| {
            Utc::now()
                .signed_duration_since(at)
                .to_std()
                .map_or(true, |age| age <= self.liveness_window)
        });

        Ok(ServiceStatus {
            status: if fresh {
                ServiceHealth::Running
            } else {
                ServiceHealth::Degraded
            },
            queue_length,
            last_ping,
        })
    }
}
