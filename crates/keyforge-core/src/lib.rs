//! # keyforge-core
//!
//! Core abstractions for the Keyforge firmware build service.
//!
//! This crate provides the foundational types and traits used across all
//! Keyforge components:
//!
//! - **Identifiers**: Strongly-typed job ids safe for address construction
//! - **Object Addresses**: The backend-neutral `{job_id}/{filename}` namespace
//! - **Storage Backends**: One contract, interchangeable drivers (local
//!   filesystem, S3-compatible bucket, in-memory for tests)
//! - **Error Types**: The shared error taxonomy and result alias
//! - **Retry**: Bounded backoff for transient connectivity failures
//!
//! ## Crate Boundary
//!
//! `keyforge-core` is the only crate allowed to define shared primitives.
//! The compile-job domain lives in `keyforge-compile`; the HTTP surface in
//! `keyforge-api`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod address;
pub mod error;
pub mod id;
pub mod observability;
pub mod retry;
pub mod storage;
pub mod storage_fs;
pub mod storage_object;

pub use address::ObjectAddress;
pub use error::{Error, Result};
pub use id::JobId;
pub use observability::{LogFormat, init_logging};
pub use storage::{ByteStream, MemoryBackend, StorageBackend};
pub use storage_fs::FilesystemBackend;
pub use storage_object::{ObjectStoreBackend, ObjectStoreTimeouts};
