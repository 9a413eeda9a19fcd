use std::path::PathBuf;

/// Convenient result alias for updater operations.
pub type Result<T> = std::result::Result<T, UpdaterError>;

/// Boxed cause attached to transport and decoding failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while resolving, fetching, verifying or installing an update.
#[derive(thiserror::Error, Debug)]
pub enum UpdaterError {
    /// A version string did not parse under the accepted version grammar.
    #[error("invalid version format {version:?}: {source}")]
    InvalidVersionFormat {
        /// The offending (trimmed) version string.
        version: String,
        #[source]
        source: semver::Error,
    },
    /// The manifest has no entry for the running platform.
    #[error("no release found for {os}/{arch}")]
    NoMatchingRelease {
        /// Runtime OS identifier that was looked up.
        os: String,
        /// Runtime architecture identifier that was looked up.
        arch: String,
    },
    /// The release manifest could not be fetched or decoded.
    #[error("release manifest at {locator} is unreadable: {source}")]
    ManifestUnreadable {
        locator: String,
        #[source]
        source: BoxError,
    },
    /// Connection, timeout or body-read failure.
    #[error("{operation} {locator} failed: {source}")]
    Transport {
        /// What was being attempted (e.g. "downloading").
        operation: &'static str,
        locator: String,
        #[source]
        source: BoxError,
    },
    /// The server answered with a non-success status.
    #[error("{locator} answered with HTTP status {status}")]
    HttpStatus { locator: String, status: u16 },
    /// A detached signature was not exactly 64 bytes long.
    #[error("ed25519 signature must be 64 bytes long and was {actual}")]
    InvalidSignatureLength {
        /// Announced or counted length, whichever was caught first.
        actual: u64,
    },
    /// The payload signature did not verify against the trust root.
    #[error("update signature verification failed")]
    VerificationFailed,
    /// The downloaded payload was empty.
    #[error("update payload is empty")]
    EmptyPayload,
    /// A binary delta could not be applied to the running executable.
    #[error("failed to apply binary patch: {0}")]
    PatchFailed(String),
    /// The produced executable did not hash to the digest declared by the release.
    #[error("executable integrity check failed (expected {expected}, got {actual})")]
    IntegrityMismatch {
        /// Expected SHA-256 digest.
        expected: String,
        /// Actual SHA-256 digest.
        actual: String,
    },
    /// Writing or swapping the executable failed; the original is left in place.
    #[error("install of {path:?} failed while {step}: {source}")]
    InstallFailed {
        step: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Another update cycle is already running in this process.
    #[error("an update cycle is already in progress")]
    UpdateInProgress,
    /// The cycle was cancelled before anything was installed.
    #[error("update cycle cancelled before install")]
    Cancelled,
    /// The configured public key is not a valid ed25519 key.
    #[error("invalid trust root: {0}")]
    InvalidTrustRoot(String),
    /// Configuration is incomplete or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl UpdaterError {
    /// Helper for wrapping failures of a filesystem step during install.
    pub fn install(step: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UpdaterError::InstallFailed {
            step,
            path: path.into(),
            source,
        }
    }

    /// Helper for wrapping transport failures.
    pub fn transport(
        operation: &'static str,
        locator: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        UpdaterError::Transport {
            operation,
            locator: locator.into(),
            source: source.into(),
        }
    }

    /// Whether retrying on a later cycle may succeed.
    ///
    /// Nothing persistent has changed when a resolve or fetch fails, so those
    /// are safe to retry. Verification and install failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpdaterError::NoMatchingRelease { .. }
                | UpdaterError::ManifestUnreadable { .. }
                | UpdaterError::Transport { .. }
                | UpdaterError::HttpStatus { .. }
                | UpdaterError::InvalidSignatureLength { .. }
                | UpdaterError::UpdateInProgress
                | UpdaterError::Cancelled
        )
    }
}
