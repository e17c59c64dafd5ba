//! The artifact resolver.
//!
//! Turns a completed job's durable record into something a client can
//! download: a public URL redirect when the active storage driver supports
//! one, or a byte stream served by this process when it does not. The
//! resolver itself carries no backend-specific logic; the shared
//! `{job_id}/{filename}` address namespace does that work.
//!
//! Resolution is a pure read: idempotent, safe to call concurrently and
//! repeatedly for the same job.

use std::sync::Arc;

use keyforge_core::{ByteStream, Error, JobId, ObjectAddress, Result, StorageBackend, retry};

use crate::record::{ArtifactKind, fetch_record};

/// A resolved artifact, ready to hand to a client.
pub enum ResolvedArtifact {
    /// Redirect the client to a stable externally-fetchable URL.
    Redirect {
        /// The public URL of the artifact.
        url: String,
    },
    /// Stream the bytes directly to the client.
    Stream {
        /// Lazily-read artifact bytes.
        stream: ByteStream,
        /// Original filename, used as the suggested download name.
        filename: String,
    },
}

impl std::fmt::Debug for ResolvedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redirect { url } => f.debug_struct("Redirect").field("url", url).finish(),
            Self::Stream { filename, .. } => f
                .debug_struct("Stream")
                .field("filename", filename)
                .finish_non_exhaustive(),
        }
    }
}

/// Resolves produced artifacts for completed jobs.
#[derive(Clone)]
pub struct ArtifactResolver {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for ArtifactResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactResolver")
            .field("storage", &"<StorageBackend>")
            .finish()
    }
}

impl ArtifactResolver {
    /// Creates a resolver over the given storage handle.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Resolves one artifact of a job.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the job has no durable record (still running,
    ///   expired without a record, or never existed).
    /// - `NotReady` if the job exists but never produced this artifact:
    ///   a failed compile has a record but no firmware.
    /// - `DependencyUnavailable` if storage stayed unreachable through
    ///   retries.
    pub async fn resolve(&self, job_id: &JobId, kind: ArtifactKind) -> Result<ResolvedArtifact> {
        let (record, _raw) = fetch_record(self.storage.as_ref(), job_id).await?;

        if kind == ArtifactKind::Firmware && !record.has_firmware() {
            return Err(Error::not_ready(job_id, kind.as_str()));
        }

        let filename = kind
            .filename(&record)
            .ok_or_else(|| Error::not_ready(job_id, kind.as_str()))?
            .to_string();

        let address = ObjectAddress::artifact(job_id, &filename)?;

        if self.storage.supports_public_urls() {
            let url = self.storage.public_url(&address).await?;
            return Ok(ResolvedArtifact::Redirect { url });
        }

        let stream =
            retry::with_backoff("storage.get_stream", || self.storage.get_stream(&address))
                .await?;

        Ok(ResolvedArtifact::Stream { stream, filename })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::StreamExt;
    use keyforge_core::{MemoryBackend, ObjectStoreBackend};
    use serde_json::json;

    fn job_id() -> JobId {
        "01JD2H2Z5W8B4Q7N1K9T3E6C0X".parse().unwrap()
    }

    async fn write_record(storage: &dyn StorageBackend, id: &JobId, record: serde_json::Value) {
        storage
            .put(
                &ObjectAddress::metadata(id),
                Bytes::from(serde_json::to_vec(&record).unwrap()),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn resolves_a_stream_on_a_streaming_backend() {
        let storage = Arc::new(MemoryBackend::new());
        let id = job_id();
        write_record(
            storage.as_ref(),
            &id,
            json!({
                "id": id.as_str(),
                "firmware": true,
                "firmware_filename": "planck_default.hex",
                "returncode": 0,
            }),
        )
        .await;
        storage
            .put(
                &ObjectAddress::artifact(&id, "planck_default.hex").unwrap(),
                Bytes::from_static(b"hex contents"),
            )
            .await
            .unwrap();

        let resolver = ArtifactResolver::new(storage);
        let resolved = resolver.resolve(&id, ArtifactKind::Firmware).await.unwrap();

        let ResolvedArtifact::Stream {
            mut stream,
            filename,
        } = resolved
        else {
            panic!("expected a stream from the memory backend");
        };

        assert_eq!(filename, "planck_default.hex");
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"hex contents");
    }

    #[tokio::test]
    async fn resolves_a_redirect_on_a_public_url_backend() {
        let storage = Arc::new(ObjectStoreBackend::new(
            Arc::new(object_store::memory::InMemory::new()),
            "https://cdn.example.com",
        ));
        let id = job_id();
        write_record(
            storage.as_ref(),
            &id,
            json!({
                "id": id.as_str(),
                "firmware": true,
                "firmware_filename": "planck_default.hex",
                "returncode": 0,
            }),
        )
        .await;

        let resolver = ArtifactResolver::new(storage);
        let resolved = resolver.resolve(&id, ArtifactKind::Firmware).await.unwrap();

        let ResolvedArtifact::Redirect { url } = resolved else {
            panic!("expected a redirect from the object-store backend");
        };
        assert_eq!(
            url,
            "https://cdn.example.com/01JD2H2Z5W8B4Q7N1K9T3E6C0X/planck_default.hex"
        );
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let resolver = ArtifactResolver::new(Arc::new(MemoryBackend::new()));
        let err = resolver
            .resolve(&job_id(), ArtifactKind::Firmware)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_build_firmware_is_not_ready() {
        let storage = Arc::new(MemoryBackend::new());
        let id = job_id();
        write_record(
            storage.as_ref(),
            &id,
            json!({
                "id": id.as_str(),
                "firmware": false,
                "firmware_filename": "stale_name.hex",
                "returncode": 2,
            }),
        )
        .await;

        let resolver = ArtifactResolver::new(storage);
        let err = resolver
            .resolve(&id, ArtifactKind::Firmware)
            .await
            .unwrap_err();
        // Never a stale or empty stream: firmware=false wins over a
        // lingering filename.
        assert!(matches!(err, Error::NotReady { .. }));
    }

    #[tokio::test]
    async fn absent_archive_is_not_ready() {
        let storage = Arc::new(MemoryBackend::new());
        let id = job_id();
        write_record(
            storage.as_ref(),
            &id,
            json!({
                "id": id.as_str(),
                "firmware": true,
                "firmware_filename": "planck_default.hex",
                "returncode": 0,
            }),
        )
        .await;

        let resolver = ArtifactResolver::new(storage);
        let err = resolver
            .resolve(&id, ArtifactKind::Source)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotReady { .. }));
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let storage = Arc::new(MemoryBackend::new());
        let id = job_id();
        write_record(
            storage.as_ref(),
            &id,
            json!({
                "id": id.as_str(),
                "firmware": true,
                "firmware_filename": "planck_default.hex",
                "returncode": 0,
            }),
        )
        .await;
        storage
            .put(
                &ObjectAddress::artifact(&id, "planck_default.hex").unwrap(),
                Bytes::from_static(b"same bytes"),
            )
            .await
            .unwrap();

        let resolver = ArtifactResolver::new(storage);

        let mut outputs = Vec::new();
        for _ in 0..2 {
            let ResolvedArtifact::Stream { mut stream, .. } = resolver
                .resolve(&id, ArtifactKind::Firmware)
                .await
                .unwrap()
            else {
                panic!("expected a stream");
            };
            let mut collected = Vec::new();
            while let Some(chunk) = stream.next().await {
                collected.extend_from_slice(&chunk.unwrap());
            }
            outputs.push(collected);
        }

        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(outputs[0], b"same bytes");
    }
}
