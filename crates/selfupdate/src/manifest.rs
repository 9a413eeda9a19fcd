use crate::error::{Result, UpdaterError};
use crate::patch::PayloadFormat;
use crate::platform::{canonical_arch, canonical_os, Platform};
use crate::version::Version;
use serde::{Deserialize, Serialize};

/// One published release in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseEntry {
    /// Display name of the artefact.
    #[serde(default)]
    pub name: String,
    /// OS identifier the artefact targets, matched case-sensitively.
    ///
    /// Uses `std::env::consts::OS` names (`linux`, `macos`, `windows`, ...);
    /// the Go spelling `darwin` is accepted for `macos`.
    pub os: String,
    /// Where to download the payload. Its signature lives at `<download_url>.ed25519`.
    pub download_url: String,
    /// Version string of the release.
    pub version: String,
    /// Optional architecture restriction, in `std::env::consts::ARCH` names.
    /// The Go spellings `amd64`, `arm64` and `386` are accepted too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Hex SHA-256 of the final executable (required for delta payloads).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default)]
    pub format: PayloadFormat,
}

impl ReleaseEntry {
    /// Whether this entry targets `platform`.
    pub fn matches(&self, platform: &Platform) -> bool {
        canonical_os(&self.os) == canonical_os(&platform.os)
            && self.arch.as_deref().map_or(true, |arch| {
                canonical_arch(arch) == canonical_arch(&platform.arch)
            })
    }

    /// Turn the entry into a [`Version`] downloading from `download_url`.
    pub fn to_version(&self, download_url: String) -> Version {
        Version {
            number: self.version.clone(),
            download_url: Some(download_url),
            sha256: self.sha256.clone(),
            format: self.format,
            name: (!self.name.is_empty()).then(|| self.name.clone()),
        }
    }
}

/// Ordered list of releases, decoded from a JSON array.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Manifest {
    pub releases: Vec<ReleaseEntry>,
}

impl Manifest {
    /// Decode a manifest document.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// First release matching `platform`, in manifest order.
    pub fn select(&self, platform: &Platform) -> Result<&ReleaseEntry> {
        self.releases
            .iter()
            .find(|entry| entry.matches(platform))
            .ok_or_else(|| UpdaterError::NoMatchingRelease {
                os: platform.os.clone(),
                arch: platform.arch.clone(),
            })
    }
}
