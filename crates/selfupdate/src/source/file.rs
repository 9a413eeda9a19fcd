use super::{read_signature, signature_locator, Payload, Source};
use crate::error::{Result, UpdaterError};
use crate::manifest::Manifest;
use crate::platform::Platform;
use crate::verify::Signature;
use crate::version::Version;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tokio::fs::File;

/// File name of the manifest inside a release directory.
pub const DEFAULT_MANIFEST_NAME: &str = "manifest.json";

/// Source reading releases from a local directory (offline mirror, mounted media).
///
/// The directory holds a manifest in the HTTP format; `download_url` entries
/// are paths relative to the directory, or absolute paths.
pub struct FileSource {
    root: PathBuf,
    manifest_name: String,
    platform: Platform,
    resolved: RwLock<Option<PathBuf>>,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            root: root.into(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            platform,
            resolved: RwLock::new(None),
        }
    }

    /// Use a manifest file name other than `manifest.json`.
    ///
    /// The name may contain platform placeholders.
    pub fn manifest_name(mut self, name: &str) -> Self {
        self.manifest_name = self.platform.expand(name);
        self
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest_name)
    }

    /// Resolve a manifest entry, or a locator this source already resolved.
    fn locate(&self, download_url: &str) -> PathBuf {
        let path = Path::new(download_url);
        if path.starts_with(&self.root) {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn payload_path(&self, version: &Version) -> Result<PathBuf> {
        version
            .download_url
            .as_ref()
            .map(|url| self.locate(url))
            .or_else(|| self.resolved.read().clone())
            .ok_or_else(|| {
                UpdaterError::InvalidConfig("no payload resolved; call latest_version first".into())
            })
    }
}

async fn open(operation: &'static str, path: &Path) -> Result<(File, u64)> {
    let locator = path.display().to_string();
    let file = File::open(path)
        .await
        .map_err(|err| UpdaterError::transport(operation, &locator, err))?;
    let length = file
        .metadata()
        .await
        .map_err(|err| UpdaterError::transport(operation, &locator, err))?
        .len();
    Ok((file, length))
}

#[async_trait]
impl Source for FileSource {
    async fn latest_version(&self) -> Result<Version> {
        let path = self.manifest_path();
        let body = tokio::fs::read(&path)
            .await
            .map_err(|err| UpdaterError::ManifestUnreadable {
                locator: path.display().to_string(),
                source: err.into(),
            })?;
        let manifest =
            Manifest::from_slice(&body).map_err(|err| UpdaterError::ManifestUnreadable {
                locator: path.display().to_string(),
                source: err.into(),
            })?;

        let entry = manifest.select(&self.platform)?;
        let payload = self.locate(&entry.download_url);
        *self.resolved.write() = Some(payload.clone());
        Ok(entry.to_version(payload.display().to_string()))
    }

    async fn get(&self, version: &Version) -> Result<Payload> {
        let path = self.payload_path(version)?;
        let (file, length) = open("opening payload", &path).await?;
        Ok(Payload {
            reader: Box::pin(file),
            content_length: Some(length),
            locator: path.display().to_string(),
        })
    }

    async fn get_signature(&self, version: &Version) -> Result<Signature> {
        let payload = self.payload_path(version)?;
        let path = PathBuf::from(signature_locator(&payload.display().to_string()));
        let (file, length) = open("opening signature", &path).await?;
        read_signature(file, Some(length), &path.display().to_string()).await
    }
}
