//! Job status derivation and the normalized status view.
//!
//! A job's status is never stored verbatim: the queue reports four
//! independent boolean flags, and the status callers see is derived from
//! them in a fixed precedence order. A separate `is_failed` flag is derived
//! from the result payload and overrides the raw flags when they disagree:
//! a `finished` job whose build exited non-zero is reported as failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use keyforge_core::JobId;

use crate::record::DurableResult;

/// Derived lifecycle status of a compile job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the queue.
    Queued,
    /// A worker is building it.
    Running,
    /// The worker flushed a result.
    Finished,
    /// The queue marked the job failed.
    Failed,
    /// The queue reported all flags false; should never happen.
    Unknown,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A job record as held by the transient status store.
///
/// Exists only while the queue broker retains the job; after retention
/// expires, the durable record (if the worker flushed one) is the only
/// surviving source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransientJob {
    /// The job id minted at enqueue time.
    pub id: JobId,
    /// When the submission was accepted.
    pub created_at: DateTime<Utc>,
    /// When the job was placed on the queue.
    pub enqueued_at: DateTime<Utc>,
    /// Queue flag: waiting for a worker.
    pub queued: bool,
    /// Queue flag: a worker picked it up.
    pub started: bool,
    /// Queue flag: the worker finished.
    pub finished: bool,
    /// Queue flag: the queue marked it failed.
    pub failed: bool,
    /// Worker-defined result payload; absent while queued, partial while
    /// running, structured or a bare diagnostic string once terminal.
    pub result: Option<Value>,
}

impl TransientJob {
    /// Derives the lifecycle status from the four queue flags.
    ///
    /// Precedence: finished, then queued, then started, then failed. All
    /// flags false yields [`JobStatus::Unknown`], which callers log as an
    /// invariant violation.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        if self.finished {
            JobStatus::Finished
        } else if self.queued {
            JobStatus::Queued
        } else if self.started {
            JobStatus::Running
        } else if self.failed {
            JobStatus::Failed
        } else {
            JobStatus::Unknown
        }
    }

    /// Derives the failure flag from the raw flag and the result payload.
    ///
    /// A job has failed if the queue says so, if the worker left a bare
    /// diagnostic string, or if a structured result carries a non-zero
    /// `returncode`. The derived flag overrides the raw status when they
    /// disagree.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        if self.failed {
            return true;
        }

        match &self.result {
            Some(Value::String(_)) => true,
            Some(value) => value
                .get("returncode")
                .and_then(Value::as_i64)
                .is_some_and(|code| code != 0),
            None => false,
        }
    }
}

/// The single normalized status view returned to callers.
///
/// Self-consistent by construction: `is_failed` always reflects the
/// returncode-derived rule, regardless of which store served the lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// The job id.
    pub id: JobId,
    /// Derived lifecycle status.
    pub status: JobStatus,
    /// Derived failure flag; overrides the raw status when they disagree.
    pub is_failed: bool,
    /// Submission timestamp; absent when served from the durable record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Enqueue timestamp; absent when served from the durable record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enqueued_at: Option<DateTime<Utc>>,
    /// Raw result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl StatusReport {
    /// Builds the view from a live queue record.
    #[must_use]
    pub fn from_transient(job: &TransientJob) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status(),
            is_failed: job.is_failed(),
            created_at: Some(job.created_at),
            enqueued_at: Some(job.enqueued_at),
            result: job.result.clone(),
        }
    }

    /// Builds the view from a worker-flushed durable record.
    ///
    /// A durable record only exists once the worker reached a terminal
    /// state, so the status is `finished` with the failure flag derived
    /// from the record itself. `raw` is the record as stored, passed
    /// through verbatim as the result payload.
    #[must_use]
    pub fn from_durable(record: &DurableResult, raw: Value) -> Self {
        Self {
            id: record.id.clone(),
            status: JobStatus::Finished,
            is_failed: record.is_failed(),
            created_at: None,
            enqueued_at: None,
            result: Some(raw),
        }
    }
}
