//! # keyforge-compile
//!
//! Compile-job domain for the Keyforge firmware build service.
//!
//! This crate implements the asynchronous job lifecycle:
//!
//! - **Submissions**: Validated compile requests; unsafe identifiers never
//!   reach the queue
//! - **Queue Abstraction**: The transient status store, with in-memory and
//!   Redis brokers
//! - **Status Normalization**: One self-consistent view derived from the
//!   queue flags and the result payload
//! - **Orchestrator**: Transient-first lookup with durable-record fallback
//! - **Artifact Resolver**: Backend-agnostic artifact retrieval (redirect
//!   or stream)
//!
//! ## The Two Sources of Truth
//!
//! A job's state lives in two places that diverge over time: the queue
//! broker (fresh, but expiring) and the worker-flushed durable record
//! (permanent, but only written at terminal states). The orchestrator
//! reads the broker first and falls back to the durable record; both
//! paths produce the same normalized [`StatusReport`](status::StatusReport).

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod artifacts;
pub mod orchestrator;
pub mod queue;
pub mod record;
pub mod request;
pub mod status;

pub use artifacts::{ArtifactResolver, ResolvedArtifact};
pub use orchestrator::{Orchestrator, ServiceHealth, ServiceStatus};
pub use queue::BuildQueue;
pub use record::{ArtifactKind, DurableResult};
pub use request::CompileRequest;
pub use status::{JobStatus, StatusReport, TransientJob};
