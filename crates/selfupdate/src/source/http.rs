use super::{read_signature, signature_locator, Payload, Source};
use crate::error::{Result, UpdaterError};
use crate::manifest::Manifest;
use crate::platform::Platform;
use crate::verify::Signature;
use crate::version::Version;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use parking_lot::RwLock;
use reqwest::{Client, Response, Url};
use std::io;
use tokio_util::io::StreamReader;

/// Source serving a JSON release manifest, payloads and `.ed25519` signatures over HTTP.
///
/// The base locator may contain `{OS}`, `{Arch}`, `{Ext}` and `{Executable}`
/// placeholders, e.g. `https://example.com/{Executable}/{OS}-{Arch}.json`.
pub struct HttpSource {
    client: Client,
    base: String,
    platform: Platform,
    resolved: RwLock<Option<String>>,
}

impl HttpSource {
    /// Create a source around an already configured client.
    pub fn new(client: Client, base: &str, platform: Platform) -> Self {
        let base = platform.expand(base);
        Self {
            client,
            base,
            platform,
            resolved: RwLock::new(None),
        }
    }

    /// Manifest locator after placeholder substitution.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Download locator resolved by the last `latest_version` call.
    pub fn resolved(&self) -> Option<String> {
        self.resolved.read().clone()
    }

    fn payload_locator(&self, version: &Version) -> String {
        version
            .download_url
            .clone()
            .or_else(|| self.resolved())
            .unwrap_or_else(|| self.base.clone())
    }

    /// Resolve a manifest `download_url` relative to the manifest location.
    fn absolute(&self, download_url: &str) -> String {
        Url::parse(&self.base)
            .and_then(|base| base.join(download_url))
            .map(String::from)
            .unwrap_or_else(|_| download_url.to_string())
    }

    async fn send(&self, operation: &'static str, locator: &str) -> Result<Response> {
        let response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|err| UpdaterError::transport(operation, locator, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::HttpStatus {
                locator: locator.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn fetch_manifest(&self) -> Result<Manifest> {
        let response = self.send("fetching manifest", &self.base).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| UpdaterError::transport("reading manifest", &self.base, err))?;
        Manifest::from_slice(&body).map_err(|err| UpdaterError::ManifestUnreadable {
            locator: self.base.clone(),
            source: err.into(),
        })
    }
}

fn body_reader(response: Response) -> StreamReader<impl Stream<Item = io::Result<Bytes>>, Bytes> {
    StreamReader::new(
        response
            .bytes_stream()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err)),
    )
}

#[async_trait]
impl Source for HttpSource {
    async fn latest_version(&self) -> Result<Version> {
        let manifest = self.fetch_manifest().await.map_err(|err| match err {
            UpdaterError::ManifestUnreadable { .. } => err,
            other => UpdaterError::ManifestUnreadable {
                locator: self.base.clone(),
                source: Box::new(other),
            },
        })?;

        let entry = manifest.select(&self.platform)?;
        let download_url = self.absolute(&entry.download_url);
        *self.resolved.write() = Some(download_url.clone());

        tracing::debug!(
            version = %entry.version,
            %download_url,
            "resolved latest release"
        );
        Ok(entry.to_version(download_url))
    }

    async fn get(&self, version: &Version) -> Result<Payload> {
        let locator = self.payload_locator(version);
        let response = self.send("downloading", &locator).await?;
        let content_length = response.content_length();

        Ok(Payload {
            reader: Box::pin(body_reader(response)),
            content_length,
            locator,
        })
    }

    async fn get_signature(&self, version: &Version) -> Result<Signature> {
        let locator = signature_locator(&self.payload_locator(version));
        let response = self.send("fetching signature", &locator).await?;
        let announced = response.content_length();
        read_signature(Box::pin(body_reader(response)), announced, &locator).await
    }
}
