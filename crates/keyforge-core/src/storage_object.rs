//! Object storage driver (S3-compatible buckets).
//!
//! Resolves logical addresses to bucket keys via the `object_store` crate.
//! This driver supports public URLs: completed artifacts are fetched by
//! clients directly from the bucket, so the service answers artifact
//! requests with a redirect instead of streaming bytes itself.
//!
//! Connectivity failures are classified as [`Error::DependencyUnavailable`]
//! so callers can apply bounded retries; a missing key is a plain
//! [`Error::NotFound`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore};

use crate::address::ObjectAddress;
use crate::error::{Error, Result};
use crate::storage::{ByteStream, StorageBackend};

/// Timeouts applied to bucket operations.
#[derive(Debug, Clone, Copy)]
pub struct ObjectStoreTimeouts {
    /// Timeout for a single request.
    pub request: Duration,
    /// Timeout for connection establishment.
    pub connect: Duration,
}

impl Default for ObjectStoreTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(60),
            connect: Duration::from_secs(10),
        }
    }
}

/// Storage backend over an S3-compatible bucket.
#[derive(Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
}

impl std::fmt::Debug for ObjectStoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreBackend")
            .field("store", &"<ObjectStore>")
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl ObjectStoreBackend {
    /// Creates a backend for the named bucket.
    ///
    /// Credentials and endpoint come from the standard `AWS_*` environment
    /// variables; `public_base_url` is the externally-reachable prefix under
    /// which bucket keys are served (no trailing slash required).
    ///
    /// # Errors
    ///
    /// Returns a storage error if the bucket client cannot be constructed.
    pub fn from_bucket(
        bucket: &str,
        public_base_url: impl Into<String>,
        timeouts: ObjectStoreTimeouts,
    ) -> Result<Self> {
        let client_options = ClientOptions::new()
            .with_timeout(timeouts.request)
            .with_connect_timeout(timeouts.connect);

        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_client_options(client_options)
            .build()
            .map_err(|e| {
                Error::storage_with_source(format!("failed to build client for bucket {bucket}"), e)
            })?;

        Ok(Self::new(Arc::new(store), public_base_url))
    }

    /// Creates a backend over an existing store (used by tests and callers
    /// that manage client construction themselves).
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: impl Into<String>) -> Self {
        let mut public_base_url = public_base_url.into();
        while public_base_url.ends_with('/') {
            public_base_url.pop();
        }
        Self {
            store,
            public_base_url,
        }
    }

    fn key(address: &ObjectAddress) -> ObjectPath {
        ObjectPath::from(address.as_str())
    }
}

fn classify(address: &ObjectAddress, err: object_store::Error) -> Error {
    match err {
        object_store::Error::NotFound { .. } => {
            Error::NotFound(format!("object not found: {address}"))
        }
        // Non-NotFound client errors classify as connectivity failures.
        other => Error::unavailable_with_source(
            format!("object store operation failed for {address}"),
            other,
        ),
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn put(&self, address: &ObjectAddress, data: Bytes) -> Result<()> {
        self.store
            .put(&Self::key(address), data.into())
            .await
            .map(|_| ())
            .map_err(|e| classify(address, e))
    }

    async fn get(&self, address: &ObjectAddress) -> Result<Bytes> {
        let result = self
            .store
            .get(&Self::key(address))
            .await
            .map_err(|e| classify(address, e))?;

        result.bytes().await.map_err(|e| classify(address, e))
    }

    async fn get_stream(&self, address: &ObjectAddress) -> Result<ByteStream> {
        let result = self
            .store
            .get(&Self::key(address))
            .await
            .map_err(|e| classify(address, e))?;

        Ok(Box::pin(result.into_stream().map(|chunk| {
            chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
        })))
    }

    fn supports_public_urls(&self) -> bool {
        true
    }

    async fn public_url(&self, address: &ObjectAddress) -> Result<String> {
        Ok(format!("{}/{address}", self.public_base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::JobId;
    use object_store::memory::InMemory;

    fn backend() -> ObjectStoreBackend {
        ObjectStoreBackend::new(Arc::new(InMemory::new()), "https://cdn.example.com/builds/")
    }

    fn address(filename: &str) -> ObjectAddress {
        let id: JobId = "01JD2H2Z5W8B4Q7N1K9T3E6C0X".parse().unwrap();
        ObjectAddress::artifact(&id, filename).unwrap()
    }

    #[tokio::test]
    async fn put_get_roundtrip_is_byte_identical() {
        let backend = backend();
        let data = Bytes::from_static(b"bucket-held firmware");

        backend.put(&address("fw.hex"), data.clone()).await.unwrap();
        let retrieved = backend.get(&address("fw.hex")).await.unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let backend = backend();
        let err = backend.get(&address("missing.hex")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn public_url_joins_base_and_address() {
        let backend = backend();
        let url = backend.public_url(&address("fw.hex")).await.unwrap();
        assert_eq!(
            url,
            "https://cdn.example.com/builds/01JD2H2Z5W8B4Q7N1K9T3E6C0X/fw.hex"
        );
        assert!(backend.supports_public_urls());
    }

    #[tokio::test]
    async fn stream_yields_same_bytes_as_get() {
        let backend = backend();
        let data = Bytes::from(vec![0x5A; 64 * 1024]);
        backend.put(&address("fw.bin"), data.clone()).await.unwrap();

        let mut stream = backend.get_stream(&address("fw.bin")).await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, data);
    }
}
