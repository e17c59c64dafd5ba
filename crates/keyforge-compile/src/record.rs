//! Worker-written durable job records.
//!
//! Once a build reaches a terminal state the worker flushes a JSON record to
//! storage at `{job_id}/{job_id}.json`. The record outlives the transient
//! queue entry and is the only source of truth after broker retention
//! expires. It is read-only from this service's perspective.
//!
//! Field names are snake_case: the record is a wire contract with the
//! worker, not an internal type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use keyforge_core::{Error, JobId, ObjectAddress, Result, StorageBackend, retry};

/// A worker-flushed record of a terminal build outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurableResult {
    /// The job id, redundant with the containing path; enables address
    /// construction from the record alone.
    pub id: JobId,
    /// Whether the build produced a firmware binary. Absent or false means
    /// the build failed to produce one, regardless of other flags.
    #[serde(default)]
    pub firmware: Option<bool>,
    /// Filename of the compiled firmware image, when produced.
    #[serde(default)]
    pub firmware_filename: Option<String>,
    /// Filename of the exported keymap archive, when produced.
    #[serde(default)]
    pub keymap_archive: Option<String>,
    /// Filename of the full source archive, when produced.
    #[serde(default)]
    pub source_archive: Option<String>,
    /// Exit status of the build step. Non-zero means logical failure even
    /// if the queue flags said otherwise.
    #[serde(default)]
    pub returncode: i64,
    /// Worker-defined fields passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DurableResult {
    /// Returns true if the build produced a firmware binary.
    #[must_use]
    pub fn has_firmware(&self) -> bool {
        self.firmware.unwrap_or(false)
    }

    /// Returns true if the recorded outcome is a failure.
    ///
    /// A record with no firmware is never a success, whatever the
    /// returncode says.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.returncode != 0 || !self.has_firmware()
    }
}

/// A named output of a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// The compiled firmware image.
    Firmware,
    /// The exported keymap archive.
    Keymap,
    /// The full source archive.
    Source,
}

impl ArtifactKind {
    /// Returns the kind's lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Firmware => "firmware",
            Self::Keymap => "keymap",
            Self::Source => "source",
        }
    }

    /// Returns the record field holding this kind's filename, if set.
    #[must_use]
    pub fn filename<'a>(self, record: &'a DurableResult) -> Option<&'a str> {
        let filename = match self {
            Self::Firmware => record.firmware_filename.as_deref(),
            Self::Keymap => record.keymap_archive.as_deref(),
            Self::Source => record.source_archive.as_deref(),
        };
        filename.filter(|name| !name.is_empty())
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fetches and parses the durable record for a job.
///
/// Returns both the typed record and the raw JSON value so status lookups
/// can pass the stored document through verbatim.
///
/// An unparsable record is logged at warn and reported as `NotFound`:
/// retrying cannot fix a malformed record, and the corruption is an
/// operator concern, not a caller concern.
///
/// # Errors
///
/// Returns `NotFound` if no record exists (or it is corrupt), or
/// `DependencyUnavailable` if storage stayed unreachable through retries.
pub async fn fetch_record(
    storage: &dyn StorageBackend,
    job_id: &JobId,
) -> Result<(DurableResult, Value)> {
    let address = ObjectAddress::metadata(job_id);

    let bytes = retry::with_backoff("storage.get_metadata", || storage.get(&address)).await?;

    let raw: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            let corrupt = Error::corrupt(format!("durable record for {job_id} is not JSON: {e}"));
            tracing::warn!(job_id = %job_id, error = %corrupt, "dropping corrupt durable record");
            return Err(Error::job_not_found(job_id));
        }
    };

    let record: DurableResult = match serde_json::from_value(raw.clone()) {
        Ok(record) => record,
        Err(e) => {
            let corrupt = Error::corrupt(format!(
                "durable record for {job_id} has unexpected shape: {e}"
            ));
            tracing::warn!(job_id = %job_id, error = %corrupt, "dropping corrupt durable record");
            return Err(Error::job_not_found(job_id));
        }
    };

    Ok((record, raw))
}
