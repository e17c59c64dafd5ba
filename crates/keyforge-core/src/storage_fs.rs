//! Local filesystem storage driver.
//!
//! Resolves logical addresses by joining them onto a root directory. This
//! driver has no public URL space: the service streams artifact bytes to
//! clients itself, so `supports_public_urls` is false and callers fall back
//! to [`StorageBackend::get_stream`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::io::ReaderStream;

use crate::address::ObjectAddress;
use crate::error::{Error, Result};
use crate::storage::{ByteStream, StorageBackend};

/// Storage backend over a local directory tree.
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Creates a backend rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the root directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            Error::storage_with_source(
                format!("failed to create storage root {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Returns the root directory of this backend.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, address: &ObjectAddress) -> PathBuf {
        // Addresses are validated at construction; the join cannot escape
        // the root because neither segment may contain separators or "..".
        self.root.join(address.as_str())
    }
}

fn classify_io(address: &ObjectAddress, err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound(format!("object not found: {address}"))
    } else {
        Error::storage_with_source(format!("filesystem operation failed for {address}"), err)
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn put(&self, address: &ObjectAddress, data: Bytes) -> Result<()> {
        let path = self.resolve(address);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::storage_with_source(
                    format!("failed to create directory {}", parent.display()),
                    e,
                )
            })?;
        }

        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| classify_io(address, e))
    }

    async fn get(&self, address: &ObjectAddress) -> Result<Bytes> {
        tokio::fs::read(self.resolve(address))
            .await
            .map(Bytes::from)
            .map_err(|e| classify_io(address, e))
    }

    async fn get_stream(&self, address: &ObjectAddress) -> Result<ByteStream> {
        let file = tokio::fs::File::open(self.resolve(address))
            .await
            .map_err(|e| classify_io(address, e))?;

        Ok(Box::pin(ReaderStream::new(file)))
    }

    fn supports_public_urls(&self) -> bool {
        false
    }

    async fn public_url(&self, address: &ObjectAddress) -> Result<String> {
        Err(Error::Internal {
            message: format!("filesystem backend cannot issue a public URL for {address}"),
        })
    }
}
