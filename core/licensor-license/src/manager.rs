//! The license manager: every operation is one store transaction.
//!
//! Seat checks and the writes they guard run inside the same
//! [`Store::transact`] call, so two activations racing for the last seat
//! are strictly ordered and only the first one gets it. Nothing inside a
//! transaction does I/O besides the store's own commit.

use crate::book::LicenseBook;
use crate::error::{LicenseError, LicenseResult};
use crate::key::{self, RawKey};
use crate::license::{
    self, Activation, InactiveReason, License, LicenseStatus, NewLicense, Plan,
};
use crate::site::SiteUrl;
use chrono::{DateTime, Utc};
use licensor_storage::Store;
use licensor_types::LicenseId;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// A freshly issued license. The only value that ever carries the raw key.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedLicense {
    pub key: RawKey,
    pub license: License,
}

/// Outcome of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReceipt {
    pub license_id: LicenseId,
    pub site_url: SiteUrl,
    pub seats_used: u32,
    pub seats_max: u32,
    /// True when the site already held a seat and none was consumed.
    pub reactivated: bool,
}

/// Outcome of a validate call for a known key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub license_id: LicenseId,
    /// Active and not expired.
    pub valid: bool,
    #[serde(flatten)]
    pub reason: Option<InactiveReason>,
    /// `None` when no site was supplied.
    pub activated_for_site: Option<bool>,
    pub seats_used: u32,
    pub seats_max: u32,
    pub plan: Plan,
    pub crawl_credits: u64,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One license with its activations, for the admin console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseDetails {
    pub license: License,
    pub seats_used: u32,
    pub activations: Vec<Activation>,
}

/// Everything in the store, for the admin console.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub licenses: Vec<License>,
    pub activations: Vec<Activation>,
}

/// Issues, activates, validates and administers licenses.
pub struct LicenseManager {
    store: Store<LicenseBook>,
}

impl LicenseManager {
    /// Creates a manager over an existing store.
    #[must_use]
    pub fn new(store: Store<LicenseBook>) -> Self {
        Self { store }
    }

    /// Opens (or creates) a file-backed manager.
    pub fn open(path: impl AsRef<Path>) -> LicenseResult<Self> {
        Ok(Self::new(Store::open(path)?))
    }

    /// Opens an empty in-memory manager (for testing).
    pub fn open_in_memory() -> LicenseResult<Self> {
        Ok(Self::new(Store::open_in_memory()?))
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Store<LicenseBook> {
        &self.store
    }

    /// Issues a new license. The returned raw key is never retrievable again.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed email, plan name, or a zero seat cap.
    pub fn create(&self, new: NewLicense) -> LicenseResult<IssuedLicense> {
        let email = license::validate_email(&new.email)?;
        let plan = match new.plan.as_deref() {
            Some(name) => Plan::new(name)?,
            None => Plan::basic(),
        };
        let max_sites =
            license::validate_max_sites(new.max_sites.unwrap_or_else(|| plan.default_max_sites()))?;
        let crawl_credits = new
            .crawl_credits
            .unwrap_or_else(|| plan.default_crawl_credits());

        let issued = self.store.transact(|book| -> LicenseResult<IssuedLicense> {
            let (mut raw, mut fingerprint) = key::generate();
            while book.fingerprint_taken(&fingerprint) {
                (raw, fingerprint) = key::generate();
            }

            let license = License {
                id: LicenseId::new(),
                key_fingerprint: fingerprint,
                key_hint: raw.hint(),
                email,
                plan,
                max_sites,
                crawl_credits,
                status: LicenseStatus::Active,
                expires_at: new.expires_at,
                created_at: Utc::now(),
            };
            book.insert_license(license.clone());
            Ok(IssuedLicense { key: raw, license })
        })?;

        info!(
            license_id = %issued.license.id,
            key = %issued.license.key_fingerprint.short(),
            plan = %issued.license.plan,
            max_sites,
            "License created"
        );
        Ok(issued)
    }

    /// Binds `site_url` to the license identified by `raw_key`.
    ///
    /// Re-activating a site that already holds a seat succeeds without
    /// consuming another one. Seats are never reclaimed automatically.
    ///
    /// # Errors
    ///
    /// `InvalidKey`, `Inactive`, `SeatLimitReached`, or `Validation` for a
    /// malformed site URL.
    pub fn activate(&self, raw_key: &str, site_url: &str) -> LicenseResult<ActivationReceipt> {
        let site = SiteUrl::parse(site_url)?;
        let fingerprint = key::fingerprint(raw_key);

        let result = self.store.transact(|book| -> LicenseResult<ActivationReceipt> {
            let now = Utc::now();
            let license = book
                .find_by_fingerprint(&fingerprint)
                .ok_or(LicenseError::InvalidKey)?;
            if let Some(reason) = license.inactive_reason(now) {
                return Err(LicenseError::Inactive(reason));
            }

            let (id, max) = (license.id, license.max_sites);
            let used = book.seats_used(&id);

            if let Some(existing) = book.activation_mut(&id, &site) {
                existing.last_seen_at = now;
                return Ok(ActivationReceipt {
                    license_id: id,
                    site_url: site.clone(),
                    seats_used: used,
                    seats_max: max,
                    reactivated: true,
                });
            }

            if used >= max {
                return Err(LicenseError::SeatLimitReached { used, max });
            }

            book.insert_activation(Activation {
                license_id: id,
                site_url: site.clone(),
                activated_at: now,
                last_seen_at: now,
            });
            Ok(ActivationReceipt {
                license_id: id,
                site_url: site.clone(),
                seats_used: used + 1,
                seats_max: max,
                reactivated: false,
            })
        });

        match &result {
            Ok(receipt) if receipt.reactivated => {
                debug!(license_id = %receipt.license_id, site = %site, "Site re-activated");
            }
            Ok(receipt) => info!(
                license_id = %receipt.license_id,
                site = %site,
                seats_used = receipt.seats_used,
                seats_max = receipt.seats_max,
                "Site activated"
            ),
            Err(e) => warn!(key = %fingerprint.short(), site = %site, "Activation refused: {}", e),
        }
        result
    }

    /// Reports whether the license behind `raw_key` is usable.
    ///
    /// Never consumes a seat. When `site_url` names an activated site,
    /// its `last_seen_at` is refreshed; an unknown site is reported as
    /// `activated_for_site: Some(false)`, not as an error. An inactive
    /// license is reported with `valid: false` and a reason.
    ///
    /// # Errors
    ///
    /// `InvalidKey`, or `Validation` for a malformed site URL.
    pub fn validate(&self, raw_key: &str, site_url: Option<&str>) -> LicenseResult<ValidationReport> {
        let site = site_url
            .filter(|s| !s.trim().is_empty())
            .map(SiteUrl::parse)
            .transpose()?;
        let fingerprint = key::fingerprint(raw_key);

        self.store.transact(|book| -> LicenseResult<ValidationReport> {
            let now = Utc::now();
            let license = book
                .find_by_fingerprint(&fingerprint)
                .ok_or(LicenseError::InvalidKey)?
                .clone();
            let reason = license.inactive_reason(now);

            let activated_for_site = site.as_ref().map(|site| {
                match book.activation_mut(&license.id, site) {
                    Some(activation) => {
                        activation.last_seen_at = now;
                        true
                    }
                    None => false,
                }
            });

            Ok(ValidationReport {
                license_id: license.id,
                valid: reason.is_none(),
                reason,
                activated_for_site,
                seats_used: book.seats_used(&license.id),
                seats_max: license.max_sites,
                plan: license.plan,
                crawl_credits: license.crawl_credits,
                expires_at: license.expires_at,
            })
        })
    }

    /// Enables or suspends a license.
    pub fn set_status(&self, id: LicenseId, status: LicenseStatus) -> LicenseResult<License> {
        let license = self.update(id, |license, _| {
            license.status = status;
            Ok(())
        })?;
        info!(license_id = %id, status = ?status, "License status changed");
        Ok(license)
    }

    /// Overwrites the crawl credit balance.
    ///
    /// # Errors
    ///
    /// `Validation` for a negative balance (the store is left unchanged),
    /// `NotFound` for an unknown id.
    pub fn set_credit_balance(&self, id: LicenseId, credits: i64) -> LicenseResult<License> {
        let credits = u64::try_from(credits).map_err(|_| {
            LicenseError::Validation(format!("crawl credits must be non-negative, got {credits}"))
        })?;
        let license = self.update(id, |license, _| {
            license.crawl_credits = credits;
            Ok(())
        })?;
        info!(license_id = %id, credits, "Credit balance set");
        Ok(license)
    }

    /// Tops up the crawl credit balance.
    pub fn add_credits(&self, id: LicenseId, amount: u64) -> LicenseResult<License> {
        let license = self.update(id, |license, _| {
            license.crawl_credits = license.crawl_credits.saturating_add(amount);
            Ok(())
        })?;
        info!(license_id = %id, amount, balance = license.crawl_credits, "Credits added");
        Ok(license)
    }

    /// Deducts `amount` crawl credits from the license behind `raw_key`.
    ///
    /// Returns the remaining balance.
    ///
    /// # Errors
    ///
    /// `InvalidKey`, `Inactive`, `Validation` for a zero amount, or
    /// `InsufficientCredits` (balance unchanged).
    pub fn consume_credits(&self, raw_key: &str, amount: u64) -> LicenseResult<u64> {
        if amount == 0 {
            return Err(LicenseError::Validation(
                "credit amount must be positive".to_string(),
            ));
        }
        let fingerprint = key::fingerprint(raw_key);

        let (id, remaining) = self.store.transact(|book| -> LicenseResult<(LicenseId, u64)> {
            let id = book
                .find_by_fingerprint(&fingerprint)
                .map(|l| l.id)
                .ok_or(LicenseError::InvalidKey)?;
            let license = book.get_mut(&id).ok_or(LicenseError::InvalidKey)?;
            if let Some(reason) = license.inactive_reason(Utc::now()) {
                return Err(LicenseError::Inactive(reason));
            }
            if license.crawl_credits < amount {
                return Err(LicenseError::InsufficientCredits {
                    available: license.crawl_credits,
                    requested: amount,
                });
            }
            license.crawl_credits -= amount;
            Ok((id, license.crawl_credits))
        })?;

        debug!(license_id = %id, amount, remaining, "Credits consumed");
        Ok(remaining)
    }

    /// Changes the seat cap.
    ///
    /// # Errors
    ///
    /// `Validation` if `max_sites` is zero or below current seat usage.
    pub fn set_max_sites(&self, id: LicenseId, max_sites: u32) -> LicenseResult<License> {
        let max_sites = license::validate_max_sites(max_sites)?;
        let license = self.update(id, |license, used| {
            if max_sites < used {
                return Err(LicenseError::Validation(format!(
                    "max_sites {max_sites} is below current usage of {used} sites"
                )));
            }
            license.max_sites = max_sites;
            Ok(())
        })?;
        info!(license_id = %id, max_sites, "Seat cap changed");
        Ok(license)
    }

    /// Renews a license, or makes it perpetual with `None`.
    pub fn set_expiry(
        &self,
        id: LicenseId,
        expires_at: Option<DateTime<Utc>>,
    ) -> LicenseResult<License> {
        let license = self.update(id, |license, _| {
            license.expires_at = expires_at;
            Ok(())
        })?;
        info!(license_id = %id, expires_at = ?expires_at, "License expiry changed");
        Ok(license)
    }

    /// Deletes a license and all of its activations.
    pub fn delete(&self, id: LicenseId) -> LicenseResult<()> {
        let (license, dropped) = self.store.transact(|book| -> LicenseResult<(License, usize)> {
            book.remove_license(&id).ok_or(LicenseError::NotFound(id))
        })?;
        info!(
            license_id = %id,
            key = %license.key_fingerprint.short(),
            activations = dropped,
            "License deleted"
        );
        Ok(())
    }

    /// Returns one license with its activations.
    pub fn get(&self, id: LicenseId) -> LicenseResult<LicenseDetails> {
        self.store.read(|book| -> LicenseResult<LicenseDetails> {
            let license = book.get(&id).ok_or(LicenseError::NotFound(id))?;
            Ok(LicenseDetails {
                license: license.clone(),
                seats_used: book.seats_used(&id),
                activations: book.activations_for(&id).cloned().collect(),
            })
        })
    }

    /// Returns every license and activation from one consistent snapshot.
    #[must_use]
    pub fn list(&self) -> Listing {
        self.store.read(|book| Listing {
            licenses: book.licenses().cloned().collect(),
            activations: book.activations().to_vec(),
        })
    }

    fn update(
        &self,
        id: LicenseId,
        f: impl FnOnce(&mut License, u32) -> LicenseResult<()>,
    ) -> LicenseResult<License> {
        self.store.transact(|book| -> LicenseResult<License> {
            let used = book.seats_used(&id);
            let license = book.get_mut(&id).ok_or(LicenseError::NotFound(id))?;
            f(license, used)?;
            Ok(license.clone())
        })
    }
}
