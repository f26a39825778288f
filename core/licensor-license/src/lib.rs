//! License issuance, seat activation and metering for Licensor.
//!
//! This module handles:
//! - Key generation and fingerprinting (raw keys are never stored)
//! - Site URL normalization so one installation maps to one seat
//! - Seat-limited activation, validation, and admin mutations
//! - Crawl credit metering
//!
//! # Design Principles
//!
//! - **One transaction per operation**: every [`LicenseManager`] call is a
//!   single [`licensor_storage::Store`] transaction, so seat checks and
//!   the writes they guard are atomic
//! - **Typed outcomes**: business refusals are [`LicenseError`] variants,
//!   only [`LicenseError::Storage`] is worth retrying
//! - **Seats are sticky**: a site keeps its seat until its license is
//!   deleted; nothing is evicted automatically
//!
//! # License Key Format
//!
//! Keys are formatted as `LIC-XXXXX-XXXXX-XXXXX-XXXXX-XXXXX-XXXXX` using
//! the Crockford base32 alphabet. Only the SHA-256 fingerprint is kept.

mod book;
mod error;
mod key;
mod license;
mod manager;
mod site;

pub use book::LicenseBook;
pub use error::{LicenseError, LicenseResult};
pub use key::{Fingerprint, KEY_PREFIX, RawKey, fingerprint, generate, normalize};
pub use license::{Activation, InactiveReason, License, LicenseStatus, NewLicense, Plan};
pub use manager::{
    ActivationReceipt, IssuedLicense, LicenseDetails, LicenseManager, Listing, ValidationReport,
};
pub use site::SiteUrl;
