//! Version comparison for update notification.
//!
//! Versions are compared by their numeric components only. Every maximal
//! run of ASCII digits is one component; everything else is a separator:
//!
//! ```text
//! "v1.2.0-beta3"  → [1, 2, 0, 3]
//! "2024.10"       → [2024, 10]
//! "nightly"       → [0]
//! ```
//!
//! The shorter sequence is padded with zeros, then the two are compared
//! lexicographically, so `1.2` == `1.2.0` and `1.10` > `1.9`.
//!
//! The update feed itself is a small JSON document:
//!
//! ```json
//! { "version": "1.4.0", "url": "https://example.com/download", "notes": "Faster PNG output" }
//! ```
//!
//! `html_url` is accepted in place of `url`. Fetching the feed is left to the
//! caller; this module only parses it and decides whether it is newer.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VersionError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Update feed has an empty version")]
    MissingVersion,
}

/// One numeric component of a version, kept as its digits.
///
/// Leading zeros are stripped, so components of any length order exactly:
/// a longer run is larger, equal lengths compare digit by digit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component(String);

impl Component {
    fn from_digits(run: &str) -> Self {
        let trimmed = run.trim_start_matches('0');
        Component(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
    }

    fn zero() -> Self {
        Component("0".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for Component {
    fn from(n: u64) -> Self {
        Component(n.to_string())
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the numeric components of a version string.
///
/// Never fails: a string without digits yields `[0]`.
pub fn parse_version(version: &str) -> Vec<Component> {
    let parts: Vec<Component> = version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .map(Component::from_digits)
        .collect();

    if parts.is_empty() {
        vec![Component::zero()]
    } else {
        parts
    }
}

/// Compare two version strings numerically, zero-padding the shorter one.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = parse_version(a);
    let b = parse_version(b);
    let zero = Component::zero();
    let len = a.len().max(b.len());

    (0..len)
        .map(|i| a.get(i).unwrap_or(&zero).cmp(b.get(i).unwrap_or(&zero)))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Outcome of comparing a remote version against the local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionComparison {
    pub remote_is_newer: bool,
}

pub fn compare(remote: &str, local: &str) -> VersionComparison {
    VersionComparison {
        remote_is_newer: compare_versions(remote, local) == Ordering::Greater,
    }
}

/// Shorthand for `compare(remote, local).remote_is_newer`.
pub fn is_newer(remote: &str, local: &str) -> bool {
    compare(remote, local).remote_is_newer
}

/// "Latest version" descriptor published alongside releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ReleaseInfo {
    /// Where to download the release: `url`, else `html_url`. Blank values are ignored.
    pub fn download_url(&self) -> Option<&str> {
        [self.url.as_deref(), self.html_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|u| !u.is_empty())
    }
}

/// Parse an update feed document.
pub fn parse_feed(json: &str) -> Result<ReleaseInfo, VersionError> {
    let release: ReleaseInfo = serde_json::from_str(json)?;
    if release.version.trim().is_empty() {
        return Err(VersionError::MissingVersion);
    }
    Ok(release)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    Available {
        version: String,
        url: Option<String>,
        notes: Option<String>,
    },
}

/// Decide whether `release` should be offered over the running `local` version.
pub fn check_update(release: &ReleaseInfo, local: &str) -> UpdateStatus {
    if !is_newer(&release.version, local) {
        return UpdateStatus::UpToDate;
    }
    UpdateStatus::Available {
        version: release.version.trim().to_string(),
        url: release.download_url().map(str::to_string),
        notes: release
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    }
}
