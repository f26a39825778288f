//! The persisted record set: every license and every activation.
//!
//! A `LicenseBook` is the state type of the license [`Store`]. It is read
//! and written wholesale, one transaction at a time, so its mutators
//! only need to keep the record set internally consistent; they never
//! have to reason about concurrent callers.
//!
//! [`Store`]: licensor_storage::Store

use crate::key::Fingerprint;
use crate::license::{Activation, License};
use crate::site::SiteUrl;
use licensor_types::LicenseId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LicenseBook {
    #[serde(default)]
    licenses: BTreeMap<LicenseId, License>,
    #[serde(default)]
    activations: Vec<Activation>,
}

impl LicenseBook {
    /// All licenses, oldest first.
    pub fn licenses(&self) -> impl Iterator<Item = &License> {
        self.licenses.values()
    }

    /// All activations across licenses.
    pub fn activations(&self) -> &[Activation] {
        &self.activations
    }

    pub fn get(&self, id: &LicenseId) -> Option<&License> {
        self.licenses.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &LicenseId) -> Option<&mut License> {
        self.licenses.get_mut(id)
    }

    pub fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<&License> {
        self.licenses
            .values()
            .find(|l| &l.key_fingerprint == fingerprint)
    }

    pub fn fingerprint_taken(&self, fingerprint: &Fingerprint) -> bool {
        self.find_by_fingerprint(fingerprint).is_some()
    }

    pub fn activations_for<'a>(
        &'a self,
        id: &'a LicenseId,
    ) -> impl Iterator<Item = &'a Activation> + 'a {
        self.activations.iter().filter(move |a| &a.license_id == id)
    }

    /// Number of distinct sites holding a seat of this license.
    pub fn seats_used(&self, id: &LicenseId) -> u32 {
        let used = self.activations_for(id).count();
        u32::try_from(used).unwrap_or(u32::MAX)
    }

    pub fn activation(&self, id: &LicenseId, site: &SiteUrl) -> Option<&Activation> {
        self.activations
            .iter()
            .find(|a| &a.license_id == id && &a.site_url == site)
    }

    pub(crate) fn activation_mut(
        &mut self,
        id: &LicenseId,
        site: &SiteUrl,
    ) -> Option<&mut Activation> {
        self.activations
            .iter_mut()
            .find(|a| &a.license_id == id && &a.site_url == site)
    }

    pub(crate) fn insert_license(&mut self, license: License) {
        self.licenses.insert(license.id, license);
    }

    pub(crate) fn insert_activation(&mut self, activation: Activation) {
        self.activations.push(activation);
    }

    /// Removes a license together with all of its activations.
    ///
    /// Returns the removed license and the number of activations dropped.
    pub(crate) fn remove_license(&mut self, id: &LicenseId) -> Option<(License, usize)> {
        let license = self.licenses.remove(id)?;
        let before = self.activations.len();
        self.activations.retain(|a| &a.license_id != id);
        Some((license, before - self.activations.len()))
    }

    /// Checks the record-set invariants, describing the first violation.
    ///
    /// - seat usage never exceeds `max_sites`
    /// - every activation references an existing license
    /// - fingerprints are unique
    /// - each (license, site) pair is activated at most once
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut fingerprints = HashSet::new();
        for license in self.licenses.values() {
            if !fingerprints.insert(&license.key_fingerprint) {
                return Err(format!("duplicate fingerprint on license {}", license.id));
            }
            let used = self.seats_used(&license.id);
            if used > license.max_sites {
                return Err(format!(
                    "license {} uses {used} of {} seats",
                    license.id, license.max_sites
                ));
            }
        }

        let mut pairs = HashSet::new();
        for activation in &self.activations {
            if !self.licenses.contains_key(&activation.license_id) {
                return Err(format!(
                    "orphan activation {} for missing license {}",
                    activation.site_url, activation.license_id
                ));
            }
            if !pairs.insert((activation.license_id, &activation.site_url)) {
                return Err(format!(
                    "site {} activated twice on license {}",
                    activation.site_url, activation.license_id
                ));
            }
        }
        Ok(())
    }
}
