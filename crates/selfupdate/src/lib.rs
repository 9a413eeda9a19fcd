//! Signed, atomic self-update for a running executable.
//!
//! An [`Updater`] asks a [`Source`] for the newest release published for the
//! running platform, compares it against the running version, downloads the
//! payload and its detached ed25519 signature, verifies the complete payload
//! against a fixed [`TrustRoot`], and only then swaps the new executable into
//! place through a rename. A failed cycle leaves the running executable
//! exactly as it was.
//!
//! ```ignore
//! use selfupdate::{HttpSource, Platform, TrustRoot, UpdateOutcome, Updater, UpdaterConfig};
//!
//! # async fn demo() -> selfupdate::Result<()> {
//! let trust_root = TrustRoot::from_hex("6a1c...")?;
//! let config = UpdaterConfig::for_current_exe(env!("CARGO_PKG_VERSION"), trust_root)?;
//! let source = HttpSource::new(
//!     reqwest::Client::new(),
//!     "https://example.com/{Executable}/releases.json",
//!     Platform::current(),
//! );
//!
//! match Updater::new(source, config).run().await? {
//!     UpdateOutcome::Installed { version, .. } => {
//!         println!("updated to {}, restart to use it", version.number);
//!     }
//!     UpdateOutcome::UpToDate { .. } => {
//!         println!("already at latest version");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod install;
mod manifest;
mod patch;
mod platform;
mod source;
mod updater;
mod verify;
mod version;

pub use config::UpdaterConfig;
pub use error::{BoxError, Result, UpdaterError};
pub use install::{
    install, old_sibling_path, stage, InstallReport, ReplaceStrategy, StagedExecutable,
};
pub use manifest::{Manifest, ReleaseEntry};
pub use patch::{reconstruct, sha256_hex, PayloadFormat};
pub use platform::{canonical_arch, canonical_os, Platform, TemplateError};
pub use source::{
    read_signature, signature_locator, ByteStream, FileSource, HttpSource, Payload, Source,
    DEFAULT_MANIFEST_NAME,
};
pub use updater::{UpdateOutcome, UpdatePhase, Updater};
pub use verify::{verify, Signature, TrustRoot, SIGNATURE_EXTENSION, SIGNATURE_LEN};
pub use version::{is_newer, parse_version, Version};
