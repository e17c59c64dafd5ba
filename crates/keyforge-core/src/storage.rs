//! Storage backend abstraction for build artifacts and job metadata.
//!
//! This module defines the storage contract shared by all drivers. The two
//! production drivers differ only in how an [`ObjectAddress`] resolves to a
//! physical location (joined filesystem path vs. bucket key) and in whether
//! direct public URLs exist:
//!
//! - [`FilesystemBackend`](crate::storage_fs::FilesystemBackend): local
//!   directory tree; artifacts are streamed by the service itself.
//! - [`ObjectStoreBackend`](crate::storage_object::ObjectStoreBackend):
//!   bucket storage; artifacts are fetched by clients via public URLs.
//!
//! Callers must check [`StorageBackend::supports_public_urls`] instead of
//! assuming a capability; the filesystem driver has no public URL space.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use futures_util::stream;

use crate::address::ObjectAddress;
use crate::error::{Error, Result};

/// A lazily-read stream of blob chunks.
///
/// Suitable for forwarding a large artifact to a client without buffering it
/// fully in memory.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Storage backend contract, identical across drivers.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Writes a blob at `address`, overwriting any existing object and
    /// creating intermediate containers as needed.
    async fn put(&self, address: &ObjectAddress, data: Bytes) -> Result<()>;

    /// Reads an entire blob.
    ///
    /// Returns [`Error::NotFound`] if no object exists at `address`.
    async fn get(&self, address: &ObjectAddress) -> Result<Bytes>;

    /// Opens a lazily-read stream over a blob.
    ///
    /// Returns [`Error::NotFound`] if no object exists at `address`.
    async fn get_stream(&self, address: &ObjectAddress) -> Result<ByteStream>;

    /// Returns true if this driver can mint externally-fetchable URLs.
    fn supports_public_urls(&self) -> bool;

    /// Returns a stable externally-fetchable URL for `address`.
    ///
    /// Only meaningful when [`supports_public_urls`](Self::supports_public_urls)
    /// is true; other drivers return an internal error.
    async fn public_url(&self, address: &ObjectAddress) -> Result<String>;
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(&self, address: &ObjectAddress, data: Bytes) -> Result<()> {
        self.objects
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .insert(address.as_str().to_string(), data);
        Ok(())
    }

    async fn get(&self, address: &ObjectAddress) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        objects
            .get(address.as_str())
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object not found: {address}")))
    }

    async fn get_stream(&self, address: &ObjectAddress) -> Result<ByteStream> {
        let data = self.get(address).await?;
        Ok(Box::pin(stream::once(async move {
            Ok::<_, std::io::Error>(data)
        })))
    }

    fn supports_public_urls(&self) -> bool {
        false
    }

    async fn public_url(&self, address: &ObjectAddress) -> Result<String> {
        Err(Error::Internal {
            message: format!("memory backend cannot issue a public URL for {address}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::JobId;
    use futures_util::StreamExt;

    fn address(filename: &str) -> ObjectAddress {
        let id: JobId = "01JD2H2Z5W8B4Q7N1K9T3E6C0X".parse().unwrap();
        ObjectAddress::artifact(&id, filename).unwrap()
    }

    #[tokio::test]
    async fn put_get_roundtrip_is_byte_identical() {
        let backend = MemoryBackend::new();
        let data = Bytes::from_static(b":0B0010000C9426034C5B26005A00000000000069\n");

        backend.put(&address("fw.hex"), data.clone()).await.unwrap();
        let retrieved = backend.get(&address("fw.hex")).await.unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn get_missing_object_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.get(&address("missing.hex")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn put_overwrites_existing_object() {
        let backend = MemoryBackend::new();
        backend
            .put(&address("fw.hex"), Bytes::from_static(b"v1"))
            .await
            .unwrap();
        backend
            .put(&address("fw.hex"), Bytes::from_static(b"v2"))
            .await
            .unwrap();

        let retrieved = backend.get(&address("fw.hex")).await.unwrap();
        assert_eq!(retrieved, Bytes::from_static(b"v2"));
    }

    #[tokio::test]
    async fn stream_yields_same_bytes_as_get() {
        let backend = MemoryBackend::new();
        let data = Bytes::from_static(b"streamed firmware image");
        backend.put(&address("fw.bin"), data.clone()).await.unwrap();

        let mut stream = backend.get_stream(&address("fw.bin")).await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, data);
    }

    #[tokio::test]
    async fn memory_backend_has_no_public_urls() {
        let backend = MemoryBackend::new();
        assert!(!backend.supports_public_urls());
        assert!(backend.public_url(&address("fw.hex")).await.is_err());
    }
}
