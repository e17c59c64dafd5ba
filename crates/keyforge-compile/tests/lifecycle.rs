//! End-to-end lifecycle tests for the orchestrator and resolver.
//!
//! These drive a job through submission, worker transitions, durable
//! flush, transient expiry, and artifact retrieval, with the worker side
//! simulated through the in-memory queue's test helpers.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{Value, json};

use keyforge_compile::queue::memory::InMemoryBuildQueue;
use keyforge_compile::{
    ArtifactKind, ArtifactResolver, BuildQueue, JobStatus, Orchestrator, ResolvedArtifact,
};
use keyforge_core::{Error, JobId, MemoryBackend, ObjectAddress, StorageBackend};

fn payload() -> Value {
    json!({
        "keyboard": "planck",
        "keymap": "default",
        "layout": "LAYOUT",
        "layers": [["KC_A", "KC_B"], ["KC_TRNS", "KC_TRNS"]],
    })
}

struct Harness {
    queue: Arc<InMemoryBuildQueue>,
    storage: Arc<MemoryBackend>,
    orchestrator: Orchestrator,
    resolver: ArtifactResolver,
}

fn harness() -> Harness {
    let queue = Arc::new(InMemoryBuildQueue::new("test"));
    let storage = Arc::new(MemoryBackend::new());
    let orchestrator = Orchestrator::new(queue.clone(), storage.clone());
    let resolver = ArtifactResolver::new(storage.clone());
    Harness {
        queue,
        storage,
        orchestrator,
        resolver,
    }
}

/// Simulates the external worker flushing its durable record.
async fn flush_durable(storage: &MemoryBackend, job_id: &JobId, record: &Value) {
    storage
        .put(
            &ObjectAddress::metadata(job_id),
            Bytes::from(serde_json::to_vec(record).unwrap()),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn successful_build_lifecycle() {
    let h = harness();

    // Submit: returns immediately with a job id, job is queued.
    let job_id = h.orchestrator.submit(&payload()).await.unwrap();
    let report = h.orchestrator.status(&job_id).await.unwrap();
    assert_eq!(report.status, JobStatus::Queued);
    assert!(!report.is_failed);

    // Worker picks it up.
    h.queue.mark_started(&job_id).unwrap();
    let report = h.orchestrator.status(&job_id).await.unwrap();
    assert_eq!(report.status, JobStatus::Running);

    // Worker finishes: flushes the durable record, then flips the flag.
    let record = json!({
        "id": job_id.as_str(),
        "firmware": true,
        "firmware_filename": "planck_default.hex",
        "keymap_archive": "planck_default.json",
        "source_archive": "planck_default.zip",
        "returncode": 0,
    });
    flush_durable(&h.storage, &job_id, &record).await;
    h.storage
        .put(
            &ObjectAddress::artifact(&job_id, "planck_default.hex").unwrap(),
            Bytes::from_static(b":00000001FF\n"),
        )
        .await
        .unwrap();
    h.queue.mark_finished(&job_id, record).unwrap();

    let report = h.orchestrator.status(&job_id).await.unwrap();
    assert_eq!(report.status, JobStatus::Finished);
    assert!(!report.is_failed);

    // Artifact resolves to a stream of the flushed bytes.
    let ResolvedArtifact::Stream {
        mut stream,
        filename,
    } = h.resolver.resolve(&job_id, ArtifactKind::Firmware).await.unwrap()
    else {
        panic!("expected a stream from the memory backend");
    };
    assert_eq!(filename, "planck_default.hex");

    let mut collected = Vec::new();
    while let Some(chunk) = stream.next().await {
        collected.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(collected, b":00000001FF\n");
}

#[tokio::test]
async fn failed_build_reports_finished_but_failed() {
    let h = harness();
    let job_id = h.orchestrator.submit(&payload()).await.unwrap();
    h.queue.mark_started(&job_id).unwrap();

    // Build exited non-zero and produced no firmware; the queue still
    // flips the finished flag.
    let record = json!({
        "id": job_id.as_str(),
        "firmware": false,
        "firmware_filename": null,
        "returncode": 2,
    });
    flush_durable(&h.storage, &job_id, &record).await;
    h.queue.mark_finished(&job_id, record).unwrap();

    let report = h.orchestrator.status(&job_id).await.unwrap();
    assert_eq!(report.status, JobStatus::Finished);
    assert!(report.is_failed, "non-zero returncode must override the flag");

    let err = h
        .resolver
        .resolve(&job_id, ArtifactKind::Firmware)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotReady { .. }));
}

#[tokio::test]
async fn status_falls_back_to_durable_after_expiry() {
    let h = harness();
    let job_id = h.orchestrator.submit(&payload()).await.unwrap();

    let record = json!({
        "id": job_id.as_str(),
        "firmware": true,
        "firmware_filename": "planck_default.hex",
        "returncode": 0,
    });
    flush_durable(&h.storage, &job_id, &record).await;
    h.queue.mark_finished(&job_id, record.clone()).unwrap();

    // Broker retention expires the transient record.
    h.queue.forget(&job_id).unwrap();

    let report = h.orchestrator.status(&job_id).await.unwrap();
    assert_eq!(report.status, JobStatus::Finished);
    assert!(!report.is_failed);
    // The stored document is passed through verbatim.
    assert_eq!(report.result, Some(record));
}

#[tokio::test]
async fn expiry_without_durable_record_is_not_found() {
    // Worker crashed before flushing: the job becomes permanently
    // unobservable, which is the accepted outcome.
    let h = harness();
    let job_id = h.orchestrator.submit(&payload()).await.unwrap();
    h.queue.forget(&job_id).unwrap();

    let err = h.orchestrator.status(&job_id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn corrupt_durable_record_reads_as_not_found() {
    let h = harness();
    let job_id = h.orchestrator.submit(&payload()).await.unwrap();
    h.queue.forget(&job_id).unwrap();

    h.storage
        .put(
            &ObjectAddress::metadata(&job_id),
            Bytes::from_static(b"\x00\x01 not json at all"),
        )
        .await
        .unwrap();

    let err = h.orchestrator.status(&job_id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn traversal_submission_is_rejected_without_enqueue() {
    let h = harness();
    let mut bad = payload();
    bad["keyboard"] = json!("../etc");

    let err = h.orchestrator.submit(&bad).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(h.queue.depth().await.unwrap(), 0);
}

#[tokio::test]
async fn resolver_resolves_archives_independently_of_firmware() {
    let h = harness();
    let job_id = h.orchestrator.submit(&payload()).await.unwrap();

    // A failed build can still export its keymap archive.
    let record = json!({
        "id": job_id.as_str(),
        "firmware": false,
        "keymap_archive": "planck_default.json",
        "returncode": 1,
    });
    flush_durable(&h.storage, &job_id, &record).await;
    h.storage
        .put(
            &ObjectAddress::artifact(&job_id, "planck_default.json").unwrap(),
            Bytes::from_static(b"{\"layers\": []}"),
        )
        .await
        .unwrap();

    let resolved = h
        .resolver
        .resolve(&job_id, ArtifactKind::Keymap)
        .await
        .unwrap();
    assert!(matches!(resolved, ResolvedArtifact::Stream { .. }));

    let err = h
        .resolver
        .resolve(&job_id, ArtifactKind::Firmware)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotReady { .. }));
}
