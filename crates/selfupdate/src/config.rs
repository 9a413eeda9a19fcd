//! Explicit configuration handed to the [`Updater`](crate::Updater).

use crate::error::{Result, UpdaterError};
use crate::install::ReplaceStrategy;
use crate::verify::TrustRoot;
use std::path::PathBuf;
use std::time::Duration;

/// Everything an update cycle needs besides its source.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Version of the running executable.
    pub current_version: String,
    /// Executable that gets replaced.
    pub target_path: PathBuf,
    /// Key every payload must be signed with.
    pub trust_root: TrustRoot,
    /// Forced swap strategy; detected at install time when `None`.
    pub strategy: Option<ReplaceStrategy>,
    /// Deadline for downloading payload and signature.
    pub fetch_timeout: Option<Duration>,
}

impl UpdaterConfig {
    /// Create a config replacing `target_path`.
    pub fn new(
        current_version: impl Into<String>,
        target_path: impl Into<PathBuf>,
        trust_root: TrustRoot,
    ) -> Self {
        Self {
            current_version: current_version.into(),
            target_path: target_path.into(),
            trust_root,
            strategy: None,
            fetch_timeout: None,
        }
    }

    /// Create a config targeting the running executable, with symlinks resolved.
    pub fn for_current_exe(
        current_version: impl Into<String>,
        trust_root: TrustRoot,
    ) -> Result<Self> {
        let exe = std::env::current_exe()
            .and_then(|path| path.canonicalize())
            .map_err(|err| {
                UpdaterError::InvalidConfig(format!("cannot locate running executable: {err}"))
            })?;
        Ok(Self::new(current_version, exe, trust_root))
    }

    /// Force a replace strategy instead of detecting it.
    pub fn strategy(mut self, strategy: ReplaceStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Bound the time spent downloading payload and signature.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Strategy to use for this install.
    pub fn replace_strategy(&self) -> ReplaceStrategy {
        self.strategy.unwrap_or_else(ReplaceStrategy::detect)
    }

    /// Check the config before any network traffic happens.
    pub fn validate(&self) -> Result<()> {
        crate::version::parse_version(&self.current_version)?;
        if !self.target_path.is_absolute() {
            return Err(UpdaterError::InvalidConfig(format!(
                "target path must be absolute: {}",
                self.target_path.display()
            )));
        }
        Ok(())
    }
}
