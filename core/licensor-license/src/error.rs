//! Error types for the licensing module.

use crate::license::InactiveReason;
use licensor_storage::StorageError;
use licensor_types::LicenseId;
use thiserror::Error;

/// Licensing-specific errors.
///
/// Everything except [`LicenseError::Storage`] is an expected business
/// outcome that callers map to a distinct response.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// No license with this id.
    #[error("license not found: {0}")]
    NotFound(LicenseId),

    /// No license matches the presented key.
    #[error("invalid license key")]
    InvalidKey,

    /// Activating another site would exceed `max_sites`.
    #[error("seat limit reached ({used}/{max} sites)")]
    SeatLimitReached { used: u32, max: u32 },

    /// License is disabled or expired.
    #[error("license inactive: {0}")]
    Inactive(InactiveReason),

    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Balance too low for a metered consumption.
    #[error("insufficient credits ({available} available, {requested} requested)")]
    InsufficientCredits { available: u64, requested: u64 },

    /// The store could not read or persist state.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl LicenseError {
    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Stable machine-readable code for transport bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidKey => "invalid_key",
            Self::SeatLimitReached { .. } => "seat_limit_reached",
            Self::Inactive(reason) => reason.code(),
            Self::Validation(_) => "validation_failed",
            Self::InsufficientCredits { .. } => "insufficient_credits",
            Self::Storage(_) => "persistence_failure",
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
