//! License and activation records.

use crate::error::{LicenseError, LicenseResult};
use crate::key::Fingerprint;
use crate::site::SiteUrl;
use chrono::{DateTime, Utc};
use licensor_types::LicenseId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A license tier. Open set: unknown names fall back to baseline defaults.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan(String);

impl Plan {
    /// Baseline tier, used when a license is created without a plan.
    pub const BASIC: &'static str = "basic";
    /// Small-team tier.
    pub const PRO: &'static str = "pro";
    /// Multi-client tier.
    pub const AGENCY: &'static str = "agency";

    /// Parses a plan name (trimmed, lowercased).
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty names, names over 32
    /// characters, or characters other than `[a-z0-9_-]`.
    pub fn new(name: &str) -> LicenseResult<Self> {
        let name = name.trim().to_lowercase();
        if name.is_empty() || name.len() > 32 {
            return Err(LicenseError::Validation(
                "plan name must be 1-32 characters".to_string(),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(LicenseError::Validation(format!(
                "plan name {name:?} may only contain letters, digits, '-' and '_'"
            )));
        }
        Ok(Self(name))
    }

    /// The baseline plan.
    #[must_use]
    pub fn basic() -> Self {
        Self(Self::BASIC.to_string())
    }

    /// Returns the plan name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Seat cap used when `max_sites` is not given explicitly.
    #[must_use]
    pub fn default_max_sites(&self) -> u32 {
        match self.0.as_str() {
            Self::PRO => 5,
            Self::AGENCY => 25,
            _ => 1,
        }
    }

    /// Crawl credits granted when `crawl_credits` is not given explicitly.
    #[must_use]
    pub fn default_crawl_credits(&self) -> u64 {
        match self.0.as_str() {
            Self::PRO => 10_000,
            Self::AGENCY => 100_000,
            _ => 1_000,
        }
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::basic()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Administrative status of a license. Deletion is not a status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// License may be activated and validated.
    #[default]
    Active,
    /// Suspended by an admin; reversible.
    Disabled,
}

/// Why a license currently refuses activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InactiveReason {
    /// Status is [`LicenseStatus::Disabled`].
    Disabled,
    /// `expires_at` has passed.
    Expired {
        /// When the license expired.
        at: DateTime<Utc>,
    },
}

impl InactiveReason {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Expired { .. } => "expired",
        }
    }
}

impl fmt::Display for InactiveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::Expired { at } => write!(f, "expired on {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        }
    }
}

/// A stored license. Never carries the raw key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub key_fingerprint: Fingerprint,
    /// Last group of the raw key, for telling keys apart in the console.
    pub key_hint: String,
    pub email: String,
    pub plan: Plan,
    pub max_sites: u32,
    pub crawl_credits: u64,
    pub status: LicenseStatus,
    /// `None` means the license never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl License {
    /// Returns true if `expires_at` is at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Returns why the license is unusable at `now`, or `None` if it is usable.
    ///
    /// A disabled license reports `Disabled` even when also expired.
    #[must_use]
    pub fn inactive_reason(&self, now: DateTime<Utc>) -> Option<InactiveReason> {
        match (self.status, self.expires_at) {
            (LicenseStatus::Disabled, _) => Some(InactiveReason::Disabled),
            (LicenseStatus::Active, Some(at)) if at <= now => Some(InactiveReason::Expired { at }),
            (LicenseStatus::Active, _) => None,
        }
    }
}

/// A site holding one seat of a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    pub license_id: LicenseId,
    pub site_url: SiteUrl,
    pub activated_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Admin input for issuing a license. Omitted fields take plan defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLicense {
    pub email: String,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub max_sites: Option<u32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub crawl_credits: Option<u64>,
}

impl NewLicense {
    /// Starts a request for the given owner email.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    #[must_use]
    pub fn max_sites(mut self, max_sites: u32) -> Self {
        self.max_sites = Some(max_sites);
        self
    }

    #[must_use]
    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn crawl_credits(mut self, crawl_credits: u64) -> Self {
        self.crawl_credits = Some(crawl_credits);
        self
    }
}

/// Checks an owner email: non-empty, one `@` with text on both sides.
pub(crate) fn validate_email(email: &str) -> LicenseResult<String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(email.to_string())
        }
        _ => Err(LicenseError::Validation(format!(
            "invalid owner email {email:?}"
        ))),
    }
}

/// Checks a seat cap is at least one.
pub(crate) fn validate_max_sites(max_sites: u32) -> LicenseResult<u32> {
    if max_sites == 0 {
        return Err(LicenseError::Validation(
            "max_sites must be at least 1".to_string(),
        ));
    }
    Ok(max_sites)
}
