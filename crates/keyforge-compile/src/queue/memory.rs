//! In-memory queue broker for testing.
//!
//! Thread-safe via `RwLock`. Not suitable for production: no persistence,
//! no cross-process visibility, no retention timer. Tests drive the worker
//! side of the lifecycle explicitly through the `mark_*` helpers, and
//! simulate broker retention expiry with [`InMemoryBuildQueue::forget`].

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use keyforge_core::{Error, JobId, Result};

use super::BuildQueue;
use crate::request::CompileRequest;
use crate::status::TransientJob;

#[derive(Debug, Default)]
struct QueueState {
    jobs: HashMap<JobId, TransientJob>,
    last_ping: Option<DateTime<Utc>>,
}

/// In-memory queue broker for tests.
#[derive(Debug)]
pub struct InMemoryBuildQueue {
    name: String,
    state: RwLock<QueueState>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Internal {
        message: "queue lock poisoned".into(),
    }
}

impl Default for InMemoryBuildQueue {
    fn default() -> Self {
        Self::new("default")
    }
}

impl InMemoryBuildQueue {
    /// Creates a new empty in-memory queue.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(QueueState::default()),
        }
    }

    /// Marks a job as picked up by a worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is unknown.
    pub fn mark_started(&self, job_id: &JobId) -> Result<()> {
        self.update(job_id, |job| {
            job.queued = false;
            job.started = true;
        })
    }

    /// Marks a job finished with the given worker result.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is unknown.
    pub fn mark_finished(&self, job_id: &JobId, result: Value) -> Result<()> {
        self.update(job_id, |job| {
            job.queued = false;
            job.started = false;
            job.finished = true;
            job.result = Some(result);
        })
    }

    /// Marks a job failed, optionally with a diagnostic payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is unknown.
    pub fn mark_failed(&self, job_id: &JobId, result: Option<Value>) -> Result<()> {
        self.update(job_id, |job| {
            job.queued = false;
            job.started = false;
            job.failed = true;
            job.result = result;
        })
    }

    /// Clears all flags on a job, simulating a broker that reports a job it
    /// no longer tracks properly.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is unknown.
    pub fn clear_flags(&self, job_id: &JobId) -> Result<()> {
        self.update(job_id, |job| {
            job.queued = false;
            job.started = false;
            job.finished = false;
            job.failed = false;
        })
    }

    /// Drops a job record, simulating broker retention expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn forget(&self, job_id: &JobId) -> Result<()> {
        self.state
            .write()
            .map_err(poison_err)?
            .jobs
            .remove(job_id);
        Ok(())
    }

    /// Records a worker liveness ping.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn record_ping(&self, at: DateTime<Utc>) -> Result<()> {
        self.state.write().map_err(poison_err)?.last_ping = Some(at);
        Ok(())
    }

    fn update(&self, job_id: &JobId, apply: impl FnOnce(&mut TransientJob)) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::job_not_found(job_id))?;
        apply(job);
        Ok(())
    }
}

#[async_trait]
impl BuildQueue for InMemoryBuildQueue {
    async fn enqueue(&self, _request: &CompileRequest) -> Result<TransientJob> {
        let now = Utc::now();
        let job = TransientJob {
            id: JobId::generate(),
            created_at: now,
            enqueued_at: now,
            queued: true,
            started: false,
            finished: false,
            failed: false,
            result: None,
        };

        self.state
            .write()
            .map_err(poison_err)?
            .jobs
            .insert(job.id.clone(), job.clone());

        Ok(job)
    }

    async fn fetch(&self, job_id: &JobId) -> Result<Option<TransientJob>> {
        Ok(self
            .state
            .read()
            .map_err(poison_err)?
            .jobs
            .get(job_id)
            .cloned())
    }

    async fn depth(&self) -> Result<usize> {
        Ok(self
            .state
            .read()
            .map_err(poison_err)?
            .jobs
            .values()
            .filter(|job| job.queued)
            .count())
    }

    async fn last_worker_ping(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.state.read().map_err(poison_err)?.last_ping)
    }

    fn queue_name(&self) -> &str {
        &self.name
    }
}
