//! `keyforge-api` binary entrypoint.
//!
//! Loads configuration from environment variables, selects the storage
//! driver and queue broker, and starts the HTTP server.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;

use keyforge_api::config::Config;
use keyforge_api::server::Server;
use keyforge_compile::BuildQueue;
use keyforge_compile::queue::memory::InMemoryBuildQueue;
use keyforge_compile::queue::redis::RedisBuildQueue;
use keyforge_core::observability::{LogFormat, init_logging};
use keyforge_core::{
    FilesystemBackend, MemoryBackend, ObjectStoreBackend, ObjectStoreTimeouts, StorageBackend,
};

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    init_logging(choose_log_format(&config));

    let storage: Arc<dyn StorageBackend> = if let Some(bucket) = config.storage.bucket.as_deref() {
        let public_base_url = config
            .storage
            .public_base_url
            .clone()
            .unwrap_or_default();
        tracing::info!(bucket = %bucket, "Using object storage backend");
        Arc::new(ObjectStoreBackend::from_bucket(
            bucket,
            public_base_url,
            ObjectStoreTimeouts::default(),
        )?)
    } else if let Some(dir) = config.storage.dir.as_deref() {
        tracing::info!(dir = %dir.display(), "Using filesystem storage backend");
        Arc::new(FilesystemBackend::new(dir)?)
    } else {
        if !config.debug {
            anyhow::bail!(
                "KEYFORGE_STORAGE_DIR or KEYFORGE_STORAGE_BUCKET is required when KEYFORGE_DEBUG=false"
            );
        }
        tracing::warn!("no storage configured; using in-memory backend (debug only)");
        Arc::new(MemoryBackend::new())
    };

    let queue: Arc<dyn BuildQueue> = if let Some(url) = config.queue.redis_url.as_deref() {
        tracing::info!("Using Redis queue broker");
        Arc::new(
            RedisBuildQueue::connect(url)
                .await?
                .with_prefix(config.queue.key_prefix.clone()),
        )
    } else {
        if !config.debug {
            anyhow::bail!("KEYFORGE_REDIS_URL is required when KEYFORGE_DEBUG=false");
        }
        tracing::warn!("no queue broker configured; using in-memory queue (debug only)");
        Arc::new(InMemoryBuildQueue::new("compile"))
    };

    let server = Server::new(config, queue, storage);
    server.serve().await?;
    Ok(())
}
