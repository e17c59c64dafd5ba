//! Logical object addresses.
//!
//! Every stored blob is addressed as `{job_id}/{filename}` regardless of
//! which storage driver resolves it to a physical location. Keeping the
//! address format backend-neutral is what lets the artifact resolver stay
//! free of backend-specific logic.
//!
//! Identifiers are validated upstream, but the address layer does not trust
//! its input: filenames embedding separators, traversal segments, or control
//! characters are rejected here as well.

use std::fmt;

use crate::error::{Error, Result};
use crate::id::JobId;

/// A backend-neutral address of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectAddress(String);

impl ObjectAddress {
    /// Builds the address of an artifact file belonging to a job.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `filename` is empty or contains
    /// separators, traversal segments, percent-encoding, or control
    /// characters.
    pub fn artifact(job_id: &JobId, filename: &str) -> Result<Self> {
        validate_filename(filename)?;
        Ok(Self(format!("{job_id}/{filename}")))
    }

    /// Builds the address of a job's durable metadata object.
    ///
    /// The metadata object always lives at `{job_id}/{job_id}.json`.
    #[must_use]
    pub fn metadata(job_id: &JobId) -> Self {
        Self(format!("{job_id}/{job_id}.json"))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty() {
        return Err(Error::validation("filename cannot be empty"));
    }

    if filename.contains('/') || filename.contains('\\') {
        return Err(Error::validation(format!(
            "filename '{filename}' cannot contain path separators"
        )));
    }

    if filename == "." || filename == ".." {
        return Err(Error::validation(format!(
            "filename '{filename}' cannot be a traversal segment"
        )));
    }

    if filename.contains('%') {
        return Err(Error::validation(format!(
            "filename '{filename}' cannot contain percent-encoding"
        )));
    }

    if filename
        .chars()
        .any(|c| c == '\n' || c == '\r' || c == '\0')
    {
        return Err(Error::validation(format!(
            "filename '{filename}' cannot contain control characters"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobId {
        "01JD2H2Z5W8B4Q7N1K9T3E6C0X".parse().unwrap()
    }

    #[test]
    fn artifact_address_joins_job_and_filename() {
        let address = ObjectAddress::artifact(&job(), "planck_default.hex").unwrap();
        assert_eq!(
            address.as_str(),
            "01JD2H2Z5W8B4Q7N1K9T3E6C0X/planck_default.hex"
        );
    }

    #[test]
    fn metadata_address_uses_job_id_twice() {
        let address = ObjectAddress::metadata(&job());
        assert_eq!(
            address.as_str(),
            "01JD2H2Z5W8B4Q7N1K9T3E6C0X/01JD2H2Z5W8B4Q7N1K9T3E6C0X.json"
        );
    }

    #[test]
    fn traversal_filenames_are_rejected() {
        for filename in ["../secret", "a/b.hex", "a\\b.hex", "..", "%2e%2e"] {
            let result = ObjectAddress::artifact(&job(), filename);
            assert!(result.is_err(), "should reject {filename}");
        }
    }

    #[test]
    fn dotted_filenames_are_allowed() {
        // Real artifacts carry extensions; only bare traversal segments are unsafe.
        assert!(ObjectAddress::artifact(&job(), "planck_default.tar.gz").is_ok());
    }

    #[test]
    fn empty_filename_is_rejected() {
        assert!(ObjectAddress::artifact(&job(), "").is_err());
    }
}
