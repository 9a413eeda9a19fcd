//! Atomic replacement of the executable on disk.
//!
//! New bytes are always written to a temporary file next to the target and
//! flushed before anything touches the target path. The target is never
//! written in place; it only ever changes through a rename.

use crate::error::{Result, UpdaterError};
use std::fs::{self, Permissions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempPath};

/// How the staged executable is swapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceStrategy {
    /// Rename the staged file straight over the target.
    RenameOver,
    /// Move the target aside to `.<name>.old` first, then rename the staged
    /// file in and delete the old one on a best-effort basis.
    RenameAside,
}

impl ReplaceStrategy {
    /// Pick the strategy the running platform supports.
    ///
    /// Windows refuses to overwrite the image of a running executable but
    /// does allow renaming it.
    pub fn detect() -> Self {
        if running_image_is_locked() {
            ReplaceStrategy::RenameAside
        } else {
            ReplaceStrategy::RenameOver
        }
    }
}

fn running_image_is_locked() -> bool {
    std::env::consts::FAMILY == "windows"
}

/// Path of the sibling the running executable is moved to.
pub fn old_sibling_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.old"))
}

/// Result of a completed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Path of the replaced executable.
    pub target_path: PathBuf,
    /// Strategy that performed the swap.
    pub strategy: ReplaceStrategy,
    /// Old executable that could not be deleted and is left for the next run.
    pub leftover: Option<PathBuf>,
}

/// New executable bytes written and synced next to the target, not yet installed.
///
/// Dropping it without calling [`commit`](Self::commit) removes the temporary
/// file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedExecutable {
    temp: TempPath,
    target: PathBuf,
}

impl StagedExecutable {
    /// Location of the staged file.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Swap the staged file into place. This is the point of no return.
    pub fn commit(self, strategy: ReplaceStrategy) -> Result<InstallReport> {
        let StagedExecutable { temp, target } = self;
        let leftover = match strategy {
            ReplaceStrategy::RenameOver => {
                rename_into_place(temp, &target)?;
                None
            }
            ReplaceStrategy::RenameAside => rename_aside(temp, &target)?,
        };
        sync_parent(&target);

        tracing::info!(path = %target.display(), ?strategy, "installed new executable");
        Ok(InstallReport {
            target_path: target,
            strategy,
            leftover,
        })
    }
}

/// Write `bytes` to a synced temporary file in the target's directory.
pub fn stage(target: &Path, bytes: &[u8]) -> Result<StagedExecutable> {
    if bytes.is_empty() {
        return Err(UpdaterError::EmptyPayload);
    }
    let parent = target
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .ok_or_else(|| {
            UpdaterError::InvalidConfig(format!(
                "target {} has no parent directory",
                target.display()
            ))
        })?;
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut temp = Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".new")
        .tempfile_in(parent)
        .map_err(|err| UpdaterError::install("creating temporary file", parent, err))?;
    let temp_path = temp.path().to_path_buf();

    temp.write_all(bytes)
        .and_then(|()| temp.flush())
        .map_err(|err| UpdaterError::install("writing temporary file", &temp_path, err))?;

    let permissions = target_permissions(target)
        .map_err(|err| UpdaterError::install("reading target permissions", target, err))?;
    if let Some(permissions) = permissions {
        temp.as_file()
            .set_permissions(permissions)
            .map_err(|err| UpdaterError::install("setting permissions", &temp_path, err))?;
    }

    temp.as_file()
        .sync_all()
        .map_err(|err| UpdaterError::install("syncing temporary file", &temp_path, err))?;

    tracing::debug!(staged = %temp_path.display(), bytes = bytes.len(), "staged new executable");
    Ok(StagedExecutable {
        temp: temp.into_temp_path(),
        target: target.to_path_buf(),
    })
}

/// Stage and commit in one step.
pub fn install(target: &Path, bytes: &[u8], strategy: ReplaceStrategy) -> Result<InstallReport> {
    stage(target, bytes)?.commit(strategy)
}

fn target_permissions(target: &Path) -> std::io::Result<Option<Permissions>> {
    match fs::metadata(target) {
        Ok(metadata) => Ok(Some(metadata.permissions())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(default_permissions()),
        Err(err) => Err(err),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}

fn rename_into_place(temp: TempPath, target: &Path) -> Result<()> {
    // On failure the temp path comes back inside the error and is removed on drop.
    temp.persist(target).map_err(|err| {
        UpdaterError::install("renaming new executable into place", target, err.error)
    })
}

/// Free sibling to move the running executable to.
///
/// Leftovers from earlier installs are removed; one that cannot be removed
/// (its image may still be running) is skipped for `.<name>.old1`,
/// `.<name>.old2`, and so on.
fn aside_path(target: &Path) -> PathBuf {
    let first = old_sibling_path(target);
    let mut candidate = first.clone();
    let mut counter = 0usize;
    loop {
        if fs::symlink_metadata(&candidate).is_err() {
            return candidate;
        }
        match fs::remove_file(&candidate) {
            Ok(()) => return candidate,
            Err(err) => {
                tracing::warn!(
                    path = %candidate.display(),
                    %err,
                    "stale old executable is still in use"
                );
            }
        }
        counter += 1;
        let mut name = first.clone().into_os_string();
        name.push(counter.to_string());
        candidate = PathBuf::from(name);
    }
}

fn rename_aside(temp: TempPath, target: &Path) -> Result<Option<PathBuf>> {
    let old = aside_path(target);

    let moved_aside = match fs::rename(target, &old) {
        Ok(()) => true,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
        Err(err) => {
            return Err(UpdaterError::install("moving running executable aside", target, err));
        }
    };

    if let Err(err) = temp.persist(target) {
        if moved_aside {
            if let Err(restore) = fs::rename(&old, target) {
                tracing::warn!(
                    old = %old.display(),
                    path = %target.display(),
                    %restore,
                    "failed to restore executable after aborted install"
                );
            }
        }
        return Err(UpdaterError::install(
            "renaming new executable into place",
            target,
            err.error,
        ));
    }

    if !moved_aside {
        return Ok(None);
    }
    match fs::remove_file(&old) {
        Ok(()) => Ok(None),
        Err(err) => {
            // Expected on Windows while the old image is still running.
            tracing::warn!(path = %old.display(), %err, "failed to remove old executable");
            Ok(Some(old))
        }
    }
}

#[cfg(unix)]
fn sync_parent(target: &Path) {
    if let Some(parent) = target.parent() {
        if let Err(err) = fs::File::open(parent).and_then(|dir| dir.sync_all()) {
            tracing::debug!(dir = %parent.display(), %err, "failed to sync directory");
        }
    }
}

#[cfg(not(unix))]
fn sync_parent(_target: &Path) {}
