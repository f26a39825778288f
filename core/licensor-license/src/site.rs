//! Site identity for activations.
//!
//! A client installation identifies itself by its site URL. The same site
//! must map to the same seat no matter how the plugin reports it, so the
//! URL is reduced to `host[:port][/path]`:
//!
//! - scheme, query, fragment and trailing slashes are dropped
//! - host is lowercased and a leading `www.` is removed
//! - a non-default port is kept

use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use url::Url;

/// A normalized site URL, unique per seat.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteUrl(String);

impl SiteUrl {
    /// Normalizes a client-supplied site URL.
    ///
    /// Input without a scheme is treated as `https://`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty input, unparseable URLs,
    /// schemes other than http/https, embedded credentials, or URLs
    /// without a host.
    pub fn parse(input: &str) -> LicenseResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(LicenseError::Validation("site url is empty".to_string()));
        }

        let with_scheme = if trimmed.contains("://") {
            Cow::Borrowed(trimmed)
        } else {
            Cow::Owned(format!("https://{trimmed}"))
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| LicenseError::Validation(format!("invalid site url {trimmed:?}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(LicenseError::Validation(format!(
                "unsupported site url scheme {:?}",
                url.scheme()
            )));
        }

        if !url.username().is_empty() || url.password().is_some() {
            return Err(LicenseError::Validation(format!(
                "site url {trimmed:?} must not carry credentials"
            )));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| LicenseError::Validation(format!("site url {trimmed:?} has no host")))?
            .to_lowercase();

        let host = match host.strip_prefix("www.") {
            Some(rest) if rest.contains('.') => rest.to_string(),
            _ => host,
        };

        let mut normalized = host;
        if let Some(port) = url.port() {
            normalized.push(':');
            normalized.push_str(&port.to_string());
        }
        normalized.push_str(url.path().trim_end_matches('/'));

        Ok(Self(normalized))
    }

    /// Returns the normalized form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
