//! Strongly-typed job identifiers.
//!
//! Job ids are opaque strings minted at enqueue time. Freshly minted ids are
//! ULIDs (lexicographically sortable, globally unique without coordination),
//! but parsing accepts any id drawn from the safe character set so that
//! records written by earlier deployments remain addressable.
//!
//! Because job ids are used verbatim to build storage addresses
//! (`{job_id}/{filename}`), parsing rejects anything that could alter path
//! resolution: separators, parent-directory sequences, control characters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

/// A unique identifier for a compile job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generates a new unique job id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a candidate id for use in storage addresses.
    fn validate(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::validation("job id cannot be empty"));
        }

        if id.len() > 128 {
            return Err(Error::validation("job id exceeds maximum length"));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::validation(format!(
                "job id '{id}' contains invalid characters (allowed: a-z, A-Z, 0-9, '-', '_')"
            )));
        }

        Ok(())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::validate(s)?;
        Ok(Self(s.to_string()))
    }
}
