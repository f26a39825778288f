//! Shared test helpers for license tests.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use licensor_license::{IssuedLicense, LicenseManager, NewLicense};

/// An empty in-memory manager.
pub fn manager() -> LicenseManager {
    LicenseManager::open_in_memory().unwrap()
}

/// Issues a perpetual license with the given seat cap.
pub fn issue(manager: &LicenseManager, max_sites: u32) -> IssuedLicense {
    manager
        .create(NewLicense::new("owner@example.com").max_sites(max_sites))
        .unwrap()
}

/// Issues a license that expired an hour ago.
pub fn issue_expired(manager: &LicenseManager) -> IssuedLicense {
    manager
        .create(NewLicense::new("late@example.com").expires_at(Utc::now() - Duration::hours(1)))
        .unwrap()
}

/// Asserts the store's record-set invariants hold.
pub fn assert_invariants(manager: &LicenseManager) {
    manager
        .store()
        .read(|book| book.check_invariants())
        .unwrap();
}
