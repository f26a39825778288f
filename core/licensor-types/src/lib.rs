//! Core type definitions for Licensor.
//!
//! This crate defines the identifier types shared by the store, the
//! license manager and the HTTP boundary:
//! - License identifiers (UUID v7)
//!
//! Domain records (licenses, activations, plans) live in `licensor-license`.

mod ids;

pub use ids::LicenseId;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid license id: {0}")]
    InvalidId(#[from] uuid::Error),
}
