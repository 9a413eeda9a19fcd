use crate::{
    config::UpdaterConfig,
    error::{Result, UpdaterError},
    install::{self, InstallReport},
    patch,
    source::Source,
    verify::Signature,
    version::{self, Version},
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Where an update cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Resolving,
    Comparing,
    Fetching,
    Verifying,
    Installing,
    /// The last cycle installed a new executable.
    Done,
    /// The last cycle found nothing newer.
    UpToDate,
    /// The last cycle failed; nothing was installed.
    Failed,
}

impl UpdatePhase {
    /// Whether a cycle is currently running.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            UpdatePhase::Resolving
                | UpdatePhase::Comparing
                | UpdatePhase::Fetching
                | UpdatePhase::Verifying
                | UpdatePhase::Installing
        )
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdatePhase::Idle => "idle",
            UpdatePhase::Resolving => "resolving",
            UpdatePhase::Comparing => "comparing",
            UpdatePhase::Fetching => "fetching",
            UpdatePhase::Verifying => "verifying",
            UpdatePhase::Installing => "installing",
            UpdatePhase::Done => "done",
            UpdatePhase::UpToDate => "up-to-date",
            UpdatePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful cycle.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// Nothing newer was published; no file was written.
    UpToDate {
        current: String,
        latest: String,
    },
    /// A new executable is in place and takes effect on next start.
    Installed {
        version: Version,
        report: InstallReport,
    },
}

/// Executables with a cycle in flight anywhere in this process.
static CLAIMED_TARGETS: Mutex<BTreeSet<PathBuf>> = parking_lot::const_mutex(BTreeSet::new());

/// Exclusive hold on the phase machine and on the target executable for the
/// duration of one cycle.
///
/// Dropping it before a terminal phase was reached marks the cycle failed.
/// Dropping it always releases the target.
struct Cycle {
    phase: Arc<Mutex<UpdatePhase>>,
    target: PathBuf,
    finished: bool,
}

impl Cycle {
    fn begin(phase: &Arc<Mutex<UpdatePhase>>, target: &Path) -> Result<Self> {
        let mut current = phase.lock();
        if current.is_active() {
            return Err(UpdaterError::UpdateInProgress);
        }
        if !CLAIMED_TARGETS.lock().insert(target.to_path_buf()) {
            tracing::debug!(path = %target.display(), "target claimed by another updater");
            return Err(UpdaterError::UpdateInProgress);
        }
        *current = UpdatePhase::Resolving;
        tracing::debug!(phase = %UpdatePhase::Resolving, "update cycle started");
        Ok(Self {
            phase: Arc::clone(phase),
            target: target.to_path_buf(),
            finished: false,
        })
    }

    fn enter(&self, next: UpdatePhase) {
        tracing::debug!(phase = %next, "update cycle advanced");
        *self.phase.lock() = next;
    }

    fn finish(mut self, terminal: UpdatePhase) {
        self.enter(terminal);
        self.finished = true;
    }
}

impl Drop for Cycle {
    fn drop(&mut self) {
        if !self.finished {
            *self.phase.lock() = UpdatePhase::Failed;
        }
        CLAIMED_TARGETS.lock().remove(&self.target);
    }
}

/// Drives resolve, compare, fetch, verify and install against a [`Source`].
///
/// At most one cycle runs at a time per target executable in this process.
/// A second cycle on the same updater, or on another updater replacing the
/// same path, fails with [`UpdaterError::UpdateInProgress`]. Share one
/// updater behind an `Arc` to drive it from several tasks or a periodic timer.
/// Nothing coordinates separate processes.
pub struct Updater<S> {
    source: S,
    config: UpdaterConfig,
    phase: Arc<Mutex<UpdatePhase>>,
}

impl<S> Updater<S>
where
    S: Source,
{
    /// Create a new updater with the given source and configuration.
    pub fn new(source: S, config: UpdaterConfig) -> Self {
        Self {
            source,
            config,
            phase: Arc::new(Mutex::new(UpdatePhase::Idle)),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Current phase, or the terminal phase of the last cycle.
    pub fn phase(&self) -> UpdatePhase {
        *self.phase.lock()
    }

    /// Resolve the latest release and return it if it is newer than the running version.
    pub async fn check(&self) -> Result<Option<Version>> {
        let cycle = Cycle::begin(&self.phase, &self.config.target_path)?;
        let latest = self.source.latest_version().await?;
        cycle.enter(UpdatePhase::Comparing);
        if version::is_newer(&self.config.current_version, &latest.number)? {
            cycle.finish(UpdatePhase::Idle);
            Ok(Some(latest))
        } else {
            cycle.finish(UpdatePhase::UpToDate);
            Ok(None)
        }
    }

    /// Run one update cycle that cannot be cancelled from outside.
    pub async fn run(&self) -> Result<UpdateOutcome> {
        self.run_cycle(&CancellationToken::new()).await
    }

    /// Run one update cycle.
    ///
    /// `cancel` is honoured until the payload has been verified. Once the
    /// install step has started it runs to completion even if the token fires
    /// or this future is dropped: the rename onto the target is the point of
    /// no return.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<UpdateOutcome> {
        let cycle = Cycle::begin(&self.phase, &self.config.target_path)?;
        let result = self.drive(cycle, cancel).await;
        match &result {
            Ok(UpdateOutcome::UpToDate { current, .. }) => {
                tracing::info!(%current, "already running the latest version")
            }
            Ok(UpdateOutcome::Installed { version, report }) => tracing::info!(
                version = %version.number,
                path = %report.target_path.display(),
                "update installed"
            ),
            Err(err) => tracing::warn!(%err, "update cycle failed"),
        }
        result
    }

    async fn drive(&self, cycle: Cycle, cancel: &CancellationToken) -> Result<UpdateOutcome> {
        self.config.validate()?;

        let latest = cancellable(cancel, self.source.latest_version()).await?;

        cycle.enter(UpdatePhase::Comparing);
        let current = &self.config.current_version;
        if !version::is_newer(current, &latest.number)? {
            cycle.finish(UpdatePhase::UpToDate);
            return Ok(UpdateOutcome::UpToDate {
                current: current.clone(),
                latest: latest.number,
            });
        }

        cycle.enter(UpdatePhase::Fetching);
        let (payload, signature) = match self.config.fetch_timeout {
            Some(limit) => {
                let locator = latest.download_url.clone().unwrap_or_default();
                cancellable(cancel, async {
                    tokio::time::timeout(limit, self.fetch(&latest))
                        .await
                        .map_err(|elapsed| {
                            UpdaterError::transport("fetching", locator.as_str(), elapsed)
                        })?
                })
                .await?
            }
            None => cancellable(cancel, self.fetch(&latest)).await?,
        };

        cycle.enter(UpdatePhase::Verifying);
        if !self.config.trust_root.verify(&payload, &signature) {
            return Err(UpdaterError::VerificationFailed);
        }
        if cancel.is_cancelled() {
            return Err(UpdaterError::Cancelled);
        }

        let target = self.config.target_path.clone();
        let strategy = self.config.replace_strategy();
        let format = latest.format;
        let expected = latest.sha256.clone();

        // Blocking filesystem work runs on a dedicated thread that owns the cycle,
        // so a dropped caller cannot release the guard mid-install.
        let report = task::spawn_blocking(move || -> Result<InstallReport> {
            let current = if format.is_delta() {
                Some(std::fs::read(&target).map_err(|err| {
                    UpdaterError::install("reading current executable", &target, err)
                })?)
            } else {
                None
            };
            let bytes =
                patch::reconstruct(format, payload, current.as_deref(), expected.as_deref())?;

            cycle.enter(UpdatePhase::Installing);
            let report = install::install(&target, &bytes, strategy)?;
            cycle.finish(UpdatePhase::Done);
            Ok(report)
        })
        .await
        .map_err(|err| {
            UpdaterError::install(
                "joining install task",
                &self.config.target_path,
                std::io::Error::new(std::io::ErrorKind::Other, err),
            )
        })??;

        Ok(UpdateOutcome::Installed {
            version: latest,
            report,
        })
    }

    async fn fetch(&self, version: &Version) -> Result<(Vec<u8>, Signature)> {
        let payload = self.source.get(version).await?.read_all().await?;
        if payload.is_empty() {
            return Err(UpdaterError::EmptyPayload);
        }
        let signature = self.source.get_signature(version).await?;
        tracing::debug!(bytes = payload.len(), version = %version.number, "fetched payload");
        Ok((payload, signature))
    }

    /// Run cycles every `every` until one installs an update or `cancel` fires.
    ///
    /// A failed cycle only fails that tick: the next tick starts a fresh
    /// cycle, so a bad release stays uninstalled until a good one replaces
    /// it. Only an invalid configuration ends the loop with an error.
    pub async fn run_periodically(
        &self,
        every: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<UpdateOutcome>> {
        self.config.validate()?;
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = ticker.tick() => {}
            }

            match self.run_cycle(cancel).await {
                Ok(outcome @ UpdateOutcome::Installed { .. }) => return Ok(Some(outcome)),
                Ok(UpdateOutcome::UpToDate { .. }) => {}
                Err(UpdaterError::Cancelled) => return Ok(None),
                Err(err) if err.is_retryable() => {
                    tracing::debug!(%err, "will retry on next tick");
                }
                Err(err) => {
                    tracing::warn!(%err, "update rejected, waiting for the next release");
                }
            }
        }
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UpdaterError::Cancelled),
        result = operation => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::ReplaceStrategy;
    use crate::platform::Platform;
    use crate::source::{FileSource, Payload};
    use crate::verify::TrustRoot;
    use async_trait::async_trait;
    use ed25519_dalek::{Signer, SigningKey};
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::Notify;

    const NEW_BINARY: &[u8] = b"\x7fELF new executable 2.0.0";
    const OLD_BINARY: &[u8] = b"\x7fELF old executable 1.5.0";

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn linux() -> Platform {
        Platform::new("linux", "x86_64", "", "myapp")
    }

    /// Release directory with a manifest, signed payload, and an installed executable.
    fn fixture(version: &str, payload: &[u8], signature: [u8; 64]) -> (TempDir, TempDir) {
        let releases = tempdir().unwrap();
        fs::write(
            releases.path().join("manifest.json"),
            serde_json::json!([
                {"name": "myapp", "os": "linux", "download_url": "myapp-linux", "version": version}
            ])
            .to_string(),
        )
        .unwrap();
        fs::write(releases.path().join("myapp-linux"), payload).unwrap();
        fs::write(releases.path().join("myapp-linux.ed25519"), signature).unwrap();

        let install_dir = tempdir().unwrap();
        fs::write(install_dir.path().join("myapp"), OLD_BINARY).unwrap();
        (releases, install_dir)
    }

    fn config(current: &str, install_dir: &Path) -> UpdaterConfig {
        UpdaterConfig::new(
            current,
            install_dir.join("myapp"),
            TrustRoot::new(signing_key().verifying_key()),
        )
        .strategy(ReplaceStrategy::RenameOver)
    }

    fn updater(releases: &Path, config: UpdaterConfig) -> Updater<FileSource> {
        Updater::new(FileSource::new(releases, linux()), config)
    }

    #[tokio::test]
    async fn installs_newer_release() {
        let signature = signing_key().sign(NEW_BINARY).to_bytes();
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let updater = updater(releases.path(), config("1.5.0", install_dir.path()));

        let outcome = updater.run().await.unwrap();
        match outcome {
            UpdateOutcome::Installed { version, report } => {
                assert_eq!(version.number, "2.0.0");
                assert_eq!(report.target_path, install_dir.path().join("myapp"));
            }
            other => panic!("expected install, got {other:?}"),
        }
        assert_eq!(updater.phase(), UpdatePhase::Done);
        assert_eq!(fs::read(install_dir.path().join("myapp")).unwrap(), NEW_BINARY);
    }

    #[tokio::test]
    async fn same_version_is_up_to_date() {
        let signature = signing_key().sign(NEW_BINARY).to_bytes();
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let updater = updater(releases.path(), config("2.0.0", install_dir.path()));

        assert!(matches!(
            updater.run().await.unwrap(),
            UpdateOutcome::UpToDate { .. }
        ));
        assert_eq!(updater.phase(), UpdatePhase::UpToDate);
        assert_eq!(fs::read(install_dir.path().join("myapp")).unwrap(), OLD_BINARY);
    }

    #[tokio::test]
    async fn bad_signature_never_touches_target() {
        let mut signature = signing_key().sign(NEW_BINARY).to_bytes();
        signature[10] ^= 0x01;
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let updater = updater(releases.path(), config("1.5.0", install_dir.path()));

        let err = updater.run().await.unwrap_err();
        assert!(matches!(err, UpdaterError::VerificationFailed));
        assert!(!err.is_retryable());
        assert_eq!(updater.phase(), UpdatePhase::Failed);
        assert_eq!(fs::read(install_dir.path().join("myapp")).unwrap(), OLD_BINARY);
        assert_eq!(fs::read_dir(install_dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn signature_from_other_key_is_rejected() {
        let signature = SigningKey::from_bytes(&[8u8; 32]).sign(NEW_BINARY).to_bytes();
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let updater = updater(releases.path(), config("1.5.0", install_dir.path()));

        assert!(matches!(
            updater.run().await,
            Err(UpdaterError::VerificationFailed)
        ));
        assert_eq!(fs::read(install_dir.path().join("myapp")).unwrap(), OLD_BINARY);
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let signature = signing_key().sign(b"").to_bytes();
        let (releases, install_dir) = fixture("2.0.0", b"", signature);
        let updater = updater(releases.path(), config("1.5.0", install_dir.path()));

        assert!(matches!(updater.run().await, Err(UpdaterError::EmptyPayload)));
        assert_eq!(fs::read(install_dir.path().join("myapp")).unwrap(), OLD_BINARY);
    }

    #[tokio::test]
    async fn invalid_release_version_fails_cycle() {
        let signature = signing_key().sign(NEW_BINARY).to_bytes();
        let (releases, install_dir) = fixture("latest", NEW_BINARY, signature);
        let updater = updater(releases.path(), config("1.5.0", install_dir.path()));

        assert!(matches!(
            updater.run().await,
            Err(UpdaterError::InvalidVersionFormat { .. })
        ));
        assert_eq!(updater.phase(), UpdatePhase::Failed);
    }

    #[tokio::test]
    async fn check_reports_without_installing() {
        let signature = signing_key().sign(NEW_BINARY).to_bytes();
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let updater = updater(releases.path(), config("1.5.0", install_dir.path()));

        let available = updater.check().await.unwrap().expect("newer release");
        assert_eq!(available.number, "2.0.0");
        assert_eq!(updater.phase(), UpdatePhase::Idle);
        assert_eq!(fs::read(install_dir.path().join("myapp")).unwrap(), OLD_BINARY);
    }

    /// Wraps a source and parks `latest_version` until released.
    struct GatedSource {
        inner: FileSource,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Source for GatedSource {
        async fn latest_version(&self) -> Result<Version> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.latest_version().await
        }

        async fn get(&self, version: &Version) -> Result<Payload> {
            self.inner.get(version).await
        }

        async fn get_signature(&self, version: &Version) -> Result<Signature> {
            self.inner.get_signature(version).await
        }
    }

    fn gated(
        releases: &Path,
        config: UpdaterConfig,
    ) -> (Arc<Updater<GatedSource>>, Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let source = GatedSource {
            inner: FileSource::new(releases, linux()),
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        };
        (Arc::new(Updater::new(source, config)), entered, release)
    }

    #[tokio::test]
    async fn second_cycle_is_rejected_while_first_runs() {
        let signature = signing_key().sign(NEW_BINARY).to_bytes();
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let (updater, entered, release) =
            gated(releases.path(), config("1.5.0", install_dir.path()));

        let first = tokio::spawn({
            let updater = Arc::clone(&updater);
            async move { updater.run().await }
        });
        entered.notified().await;
        assert_eq!(updater.phase(), UpdatePhase::Resolving);

        assert!(matches!(
            updater.run().await,
            Err(UpdaterError::UpdateInProgress)
        ));
        assert!(matches!(
            updater.check().await,
            Err(UpdaterError::UpdateInProgress)
        ));
        assert_eq!(updater.phase(), UpdatePhase::Resolving);

        release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, UpdateOutcome::Installed { .. }));
        assert_eq!(updater.phase(), UpdatePhase::Done);
        assert_eq!(fs::read(install_dir.path().join("myapp")).unwrap(), NEW_BINARY);
    }

    #[tokio::test]
    async fn cancellation_before_verify_leaves_nothing_behind() {
        let signature = signing_key().sign(NEW_BINARY).to_bytes();
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let (updater, entered, release) =
            gated(releases.path(), config("1.5.0", install_dir.path()));

        let cancel = CancellationToken::new();
        let cycle = tokio::spawn({
            let updater = Arc::clone(&updater);
            let cancel = cancel.clone();
            async move { updater.run_cycle(&cancel).await }
        });
        entered.notified().await;
        cancel.cancel();

        assert!(matches!(
            cycle.await.unwrap(),
            Err(UpdaterError::Cancelled)
        ));
        assert_eq!(updater.phase(), UpdatePhase::Failed);
        assert_eq!(fs::read(install_dir.path().join("myapp")).unwrap(), OLD_BINARY);
        assert_eq!(fs::read_dir(install_dir.path()).unwrap().count(), 1);

        // A failed cycle does not block the next one.
        release.notify_one();
        assert!(matches!(
            updater.run().await.unwrap(),
            UpdateOutcome::Installed { .. }
        ));
    }

    #[tokio::test]
    async fn periodic_runs_stop_after_install() {
        let signature = signing_key().sign(NEW_BINARY).to_bytes();
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let updater = updater(releases.path(), config("1.5.0", install_dir.path()));

        let outcome = updater
            .run_periodically(Duration::from_millis(10), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, Some(UpdateOutcome::Installed { .. })));
    }

    #[tokio::test]
    async fn periodic_runs_end_on_cancel() {
        let signature = signing_key().sign(NEW_BINARY).to_bytes();
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let updater = updater(releases.path(), config("2.0.0", install_dir.path()));

        let cancel = CancellationToken::new();
        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };
        let outcome = updater
            .run_periodically(Duration::from_millis(5), &cancel)
            .await
            .unwrap();
        assert!(outcome.is_none());
        stopper.await.unwrap();
    }

    #[tokio::test]
    async fn periodic_runs_outlast_rejected_release() {
        let mut signature = signing_key().sign(NEW_BINARY).to_bytes();
        signature[3] ^= 0x80;
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let updater = updater(releases.path(), config("1.5.0", install_dir.path()));

        let cancel = CancellationToken::new();
        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                cancel.cancel();
            })
        };
        let outcome = updater
            .run_periodically(Duration::from_millis(10), &cancel)
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(updater.phase(), UpdatePhase::Failed);
        assert_eq!(fs::read(install_dir.path().join("myapp")).unwrap(), OLD_BINARY);
        assert_eq!(fs::read_dir(install_dir.path()).unwrap().count(), 1);
        stopper.await.unwrap();
    }

    #[tokio::test]
    async fn periodic_runs_pick_up_republished_release() {
        let mut signature = signing_key().sign(NEW_BINARY).to_bytes();
        signature[3] ^= 0x80;
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let updater = updater(releases.path(), config("1.5.0", install_dir.path()));

        let republish = {
            let signature_path = releases.path().join("myapp-linux.ed25519");
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(60)).await;
                fs::write(signature_path, signing_key().sign(NEW_BINARY).to_bytes()).unwrap();
            })
        };
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            updater.run_periodically(Duration::from_millis(10), &CancellationToken::new()),
        )
        .await
        .expect("loop installs once the release is fixed")
        .unwrap();
        assert!(matches!(outcome, Some(UpdateOutcome::Installed { .. })));
        assert_eq!(fs::read(install_dir.path().join("myapp")).unwrap(), NEW_BINARY);
        republish.await.unwrap();
    }

    #[tokio::test]
    async fn periodic_runs_retry_missing_manifest() {
        let signature = signing_key().sign(NEW_BINARY).to_bytes();
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let manifest = releases.path().join("manifest.json");
        let published = fs::read(&manifest).unwrap();
        fs::remove_file(&manifest).unwrap();
        let updater = updater(releases.path(), config("1.5.0", install_dir.path()));

        let publish = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            fs::write(manifest, published).unwrap();
        });
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            updater.run_periodically(Duration::from_millis(10), &CancellationToken::new()),
        )
        .await
        .expect("loop installs once the manifest appears")
        .unwrap();
        assert!(matches!(outcome, Some(UpdateOutcome::Installed { .. })));
        publish.await.unwrap();
    }

    #[tokio::test]
    async fn periodic_runs_refuse_invalid_config() {
        let signature = signing_key().sign(NEW_BINARY).to_bytes();
        let (releases, _install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let relative = UpdaterConfig::new(
            "1.5.0",
            "bin/myapp",
            TrustRoot::new(signing_key().verifying_key()),
        );
        let updater = updater(releases.path(), relative);

        assert!(matches!(
            updater
                .run_periodically(Duration::from_millis(10), &CancellationToken::new())
                .await,
            Err(UpdaterError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn updaters_sharing_a_target_exclude_each_other() {
        let signature = signing_key().sign(NEW_BINARY).to_bytes();
        let (releases, install_dir) = fixture("2.0.0", NEW_BINARY, signature);
        let (first, entered, release) =
            gated(releases.path(), config("1.5.0", install_dir.path()));
        let second = updater(releases.path(), config("1.5.0", install_dir.path()));

        let running = tokio::spawn({
            let first = Arc::clone(&first);
            async move { first.run().await }
        });
        entered.notified().await;

        assert!(matches!(
            second.run().await,
            Err(UpdaterError::UpdateInProgress)
        ));
        assert_eq!(second.phase(), UpdatePhase::Idle);

        // An updater for a different executable is not affected.
        let elsewhere = tempdir().unwrap();
        fs::write(elsewhere.path().join("myapp"), OLD_BINARY).unwrap();
        let other = updater(releases.path(), config("1.5.0", elsewhere.path()));
        assert!(other.check().await.unwrap().is_some());

        release.notify_one();
        assert!(matches!(
            running.await.unwrap().unwrap(),
            UpdateOutcome::Installed { .. }
        ));
        assert!(second.check().await.unwrap().is_some());
    }
}
