//! Identifier types used throughout Licensor.
//!
//! Uses UUID v7 for time-ordered, globally unique identifiers, so a
//! listing sorted by id is also sorted by creation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a license record.
///
/// Assigned once at creation and never changed. Unlike the license key,
/// the id is not a secret: it appears in admin URLs and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseId(Uuid);

impl LicenseId {
    /// Creates a new license ID with the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a license ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses a license ID from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

impl Default for LicenseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LicenseId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}
