//! Redis-backed queue broker for production.
//!
//! Jobs are stored as Redis hashes with one field per flag plus the raw
//! submission and result payloads; pending ids live on a list the workers
//! consume from. The broker applies its own retention to finished jobs,
//! which is why lookups must be prepared for a hash to have vanished.
//!
//! # Key Schema
//!
//! | Key Pattern            | Type   | Purpose                           |
//! |------------------------|--------|-----------------------------------|
//! | `{prefix}:job:{id}`    | Hash   | Job record (flags, times, result) |
//! | `{prefix}:queue`       | List   | Pending job ids, oldest first     |
//! | `{prefix}:worker_ping` | String | Worker liveness, epoch seconds    |
//!
//! # Connection Model
//!
//! Holds a [`MultiplexedConnection`], which clones cheaply; all clones
//! share one TCP connection. Each method clones it for concurrent safety.

use std::collections::HashMap;

use ::redis::aio::MultiplexedConnection;
use ::redis::AsyncCommands;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use keyforge_core::{Error, JobId, Result};

use super::BuildQueue;
use crate::request::CompileRequest;
use crate::status::TransientJob;

/// Redis-backed queue broker.
#[derive(Debug, Clone)]
pub struct RedisBuildQueue {
    conn: MultiplexedConnection,
    key_prefix: String,
    name: String,
}

fn broker_err(message: impl Into<String>) -> impl FnOnce(::redis::RedisError) -> Error {
    let message = message.into();
    move |e| Error::unavailable_with_source(message, e)
}

impl RedisBuildQueue {
    /// Creates a broker by connecting to Redis at the given URL.
    ///
    /// The URL format is `redis://[:<password>@]<host>:<port>[/<db>]`.
    /// Fails fast if the connection cannot be established.
    ///
    /// # Errors
    ///
    /// Returns `DependencyUnavailable` if the client cannot be created or
    /// the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = ::redis::Client::open(url)
            .map_err(broker_err("failed to create Redis client"))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(broker_err("failed to connect to Redis"))?;

        Ok(Self::with_connection(conn))
    }

    /// Creates a broker over a pre-built multiplexed connection.
    #[must_use]
    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: "keyforge".to_string(),
            name: "compile".to_string(),
        }
    }

    /// Sets a custom key prefix (builder pattern). Useful for test
    /// isolation against a shared Redis instance.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn job_key(&self, job_id: &JobId) -> String {
        format!("{}:job:{job_id}", self.key_prefix)
    }

    fn queue_key(&self) -> String {
        format!("{}:queue", self.key_prefix)
    }

    fn ping_key(&self) -> String {
        format!("{}:worker_ping", self.key_prefix)
    }
}

fn parse_flag(fields: &HashMap<String, String>, name: &str) -> bool {
    fields
        .get(name)
        .is_some_and(|value| value == "1" || value == "true")
}

fn parse_timestamp(
    job_id: &JobId,
    fields: &HashMap<String, String>,
    name: &str,
) -> Result<DateTime<Utc>> {
    let raw = fields.get(name).ok_or_else(|| Error::Serialization {
        message: format!("job {job_id} is missing field {name}"),
    })?;

    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Serialization {
            message: format!("job {job_id} has malformed {name}: {e}"),
        })
}

/// Parses a stored result payload.
///
/// Workers normally store JSON, but a crashed build may leave a bare
/// diagnostic string; both must round-trip into the status view.
fn parse_result(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[async_trait]
impl BuildQueue for RedisBuildQueue {
    async fn enqueue(&self, request: &CompileRequest) -> Result<TransientJob> {
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

        let payload = serde_json::to_string(request).map_err(|e| Error::Serialization {
            message: format!("failed to encode submission: {e}"),
        })?;

        let fields: Vec<(&str, String)> = vec![
            ("request", payload),
            ("created_at", job.created_at.to_rfc3339()),
            ("enqueued_at", job.enqueued_at.to_rfc3339()),
            ("queued", "1".to_string()),
            ("started", "0".to_string()),
            ("finished", "0".to_string()),
            ("failed", "0".to_string()),
        ];

        let mut conn = self.conn.clone();
        ::redis::pipe()
            .atomic()
            .hset_multiple(self.job_key(&job.id), &fields)
            .ignore()
            .rpush(self.queue_key(), job.id.as_str())
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(broker_err("failed to enqueue job"))?;

        Ok(job)
    }

    async fn fetch(&self, job_id: &JobId) -> Result<Option<TransientJob>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(self.job_key(job_id))
            .await
            .map_err(broker_err("failed to fetch job"))?;

        if fields.is_empty() {
            return Ok(None);
        }

        Ok(Some(TransientJob {
            id: job_id.clone(),
            created_at: parse_timestamp(job_id, &fields, "created_at")?,
            enqueued_at: parse_timestamp(job_id, &fields, "enqueued_at")?,
            queued: parse_flag(&fields, "queued"),
            started: parse_flag(&fields, "started"),
            finished: parse_flag(&fields, "finished"),
            failed: parse_flag(&fields, "failed"),
            result: fields.get("result").map(|raw| parse_result(raw)),
        }))
    }

    async fn depth(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        conn.llen(self.queue_key())
            .await
            .map_err(broker_err("failed to read queue depth"))
    }

    async fn last_worker_ping(&self) -> Result<Option<DateTime<Utc>>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.ping_key())
            .await
            .map_err(broker_err("failed to read worker ping"))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let epoch: f64 = raw.parse().map_err(|_| Error::Serialization {
            message: format!("worker ping is not an epoch timestamp: {raw}"),
        })?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (secs, nanos) = (epoch as i64, (epoch.fract() * 1e9) as u32);
        Ok(DateTime::from_timestamp(secs, nanos))
    }

    fn queue_name(&self) -> &str {
        &self.name
    }
}
