//! # keyforge-api
//!
//! HTTP API server for the Keyforge firmware build service.
//!
//! A thin axum adapter over the compile-job domain: routes parse and map,
//! the orchestrator and resolver do the work. Configuration comes from
//! `KEYFORGE_*` environment variables; the storage driver and queue broker
//! are selected once at process start.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod routes;
pub mod server;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use server::{AppState, Server};
