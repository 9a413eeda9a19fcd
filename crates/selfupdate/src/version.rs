//! Version comparison and the release descriptor handed out by sources.

use crate::error::{Result, UpdaterError};
use crate::patch::PayloadFormat;
use std::cmp::Ordering;

/// A release resolved by a [`Source`](crate::Source).
///
/// Created by `latest_version`, consumed once by the updater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Version identifier as published, e.g. `2.0.0`.
    pub number: String,
    /// Download locator resolved from the manifest, if the source resolves one.
    pub download_url: Option<String>,
    /// Hex SHA-256 of the final executable, when the release declares it.
    pub sha256: Option<String>,
    /// Whether the payload is a full executable or a delta.
    pub format: PayloadFormat,
    /// Human readable release name.
    pub name: Option<String>,
}

impl Version {
    /// Release carrying only a version number.
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            download_url: None,
            sha256: None,
            format: PayloadFormat::Full,
            name: None,
        }
    }

    /// Attach a resolved download locator.
    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    /// Attach the expected digest of the final executable.
    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    /// Set the payload format.
    pub fn with_format(mut self, format: PayloadFormat) -> Self {
        self.format = format;
        self
    }
}

/// Parse a version string, tolerating surrounding whitespace and a leading `v`.
pub fn parse_version(raw: &str) -> Result<semver::Version> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    semver::Version::parse(stripped).map_err(|source| UpdaterError::InvalidVersionFormat {
        version: trimmed.to_string(),
        source,
    })
}

/// Returns true iff `candidate` strictly exceeds `current`.
///
/// Build metadata does not take part in precedence.
pub fn is_newer(current: &str, candidate: &str) -> Result<bool> {
    let current = parse_version(current)?;
    let candidate = parse_version(candidate)?;
    Ok(precedence(&candidate, &current) == Ordering::Greater)
}

fn precedence(a: &semver::Version, b: &semver::Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_release_versions() {
        let ordered = [
            "0.9.9",
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
            "1.2.0",
            "1.10.0",
            "2.0.0",
        ];
        for window in ordered.windows(2) {
            let (a, b) = (window[0], window[1]);
            assert!(is_newer(a, b).unwrap(), "{b} should be newer than {a}");
            assert!(!is_newer(b, a).unwrap(), "{a} should not be newer than {b}");
            assert!(!is_newer(a, a).unwrap());
        }
    }

    #[test]
    fn trims_and_accepts_v_prefix() {
        assert!(is_newer(" 1.5.0\n", "v2.0.0").unwrap());
        assert!(!is_newer("V2.0.0", "2.0.0 ").unwrap());
    }

    #[test]
    fn build_metadata_does_not_make_a_release_newer() {
        assert!(!is_newer("1.0.0+build.1", "1.0.0+build.2").unwrap());
        assert!(!is_newer("1.0.0+build.2", "1.0.0+build.1").unwrap());
    }

    #[test]
    fn rejects_malformed_versions() {
        for bad in ["", "1.0", "latest", "1.0.0.0", "01.0.0"] {
            let err = is_newer("1.0.0", bad).unwrap_err();
            assert!(
                matches!(err, UpdaterError::InvalidVersionFormat { .. }),
                "{bad:?} gave {err:?}"
            );
        }
        assert!(matches!(
            is_newer("nope", "1.0.0"),
            Err(UpdaterError::InvalidVersionFormat { .. })
        ));
    }
}
