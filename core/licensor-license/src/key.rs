//! License key generation and fingerprinting.
//!
//! Raw keys look like `LIC-7K2QD-M9XWA-0PZ3N-T4BFE-QH8RS-WQ4TZ`: six
//! groups of five Crockford base32 characters (150 bits from the OS
//! RNG). Only the SHA-256 fingerprint of the normalized key is stored;
//! the raw key leaves the server exactly once, in the create response.
//!
//! Client input is normalized before hashing so that a key read over the
//! phone still matches: case, dash placement, and the Crockford
//! confusables (`O` → `0`, `I`/`L` → `1`) are forgiven.

use rand::Rng;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Prefix of every raw key.
pub const KEY_PREFIX: &str = "LIC";

/// Crockford base32 alphabet (no I, L, O, U).
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

const GROUPS: usize = 6;
const GROUP_LEN: usize = 5;
const BODY_LEN: usize = GROUPS * GROUP_LEN;

/// A raw license key. Shown to the admin once, never stored.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RawKey(String);

impl RawKey {
    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the fingerprint of this key.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.0)
    }

    /// Returns the last group, safe to store and display as a hint.
    #[must_use]
    pub fn hint(&self) -> String {
        let start = self.0.len().saturating_sub(GROUP_LEN);
        self.0[start..].to_string()
    }
}

impl fmt::Debug for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawKey").field(&"[REDACTED]").finish()
    }
}

impl Serialize for RawKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// One-way fingerprint of a license key (lowercase hex SHA-256).
///
/// Safe to store and to log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Returns the full hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first 12 hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates a new random key and its fingerprint.
#[must_use]
pub fn generate() -> (RawKey, Fingerprint) {
    let mut rng = OsRng;
    let groups: Vec<String> = (0..GROUPS)
        .map(|_| {
            (0..GROUP_LEN)
                .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
                .collect()
        })
        .collect();

    let key = RawKey(format!("{KEY_PREFIX}-{}", groups.join("-")));
    let fp = key.fingerprint();
    (key, fp)
}

/// Computes the fingerprint of a client-supplied key.
///
/// Deterministic: equal keys (after normalization) give equal fingerprints.
#[must_use]
pub fn fingerprint(raw: &str) -> Fingerprint {
    let normalized = normalize(raw);
    let digest = Sha256::digest(normalized.as_bytes());
    Fingerprint(hex::encode(digest))
}

/// Normalizes user input into canonical key form.
///
/// Input that cannot be a key is still normalized (and will simply match
/// nothing), so this never fails.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let upper = raw.trim().to_uppercase().replace([' ', '_'], "-");
    let body = upper
        .strip_prefix(KEY_PREFIX)
        .map(|rest| rest.trim_start_matches('-'))
        .unwrap_or(&upper);

    let body: String = body
        .chars()
        .filter(|c| *c != '-')
        .map(|c| match c {
            'O' => '0',
            'I' | 'L' => '1',
            other => other,
        })
        .collect();

    if body.len() != BODY_LEN || !body.bytes().all(|b| ALPHABET.contains(&b)) {
        return format!("{KEY_PREFIX}-{body}");
    }

    let groups: Vec<&str> = (0..GROUPS)
        .map(|i| &body[i * GROUP_LEN..(i + 1) * GROUP_LEN])
        .collect();
    format!("{KEY_PREFIX}-{}", groups.join("-"))
}
