//! Where release metadata, payloads and signatures come from.

use crate::error::{Result, UpdaterError};
use crate::verify::{Signature, SIGNATURE_LEN};
use crate::version::Version;
use async_trait::async_trait;
use std::fmt;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

mod file;
mod http;

pub use file::{FileSource, DEFAULT_MANIFEST_NAME};
pub use http::HttpSource;

/// Boxed byte stream of a payload being downloaded.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// An open payload download.
///
/// Whoever reads the stream last owns it; dropping it closes the transfer.
pub struct Payload {
    /// The payload bytes, in order.
    pub reader: ByteStream,
    /// Length announced by the source. Only a hint; `None` when unknown.
    pub content_length: Option<u64>,
    /// Locator the payload is read from, for diagnostics.
    pub locator: String,
}

impl Payload {
    /// Read the whole payload into memory.
    ///
    /// The returned buffer is the source of truth for the payload size,
    /// whatever was announced.
    pub async fn read_all(mut self) -> Result<Vec<u8>> {
        let capacity = self.content_length.unwrap_or(0).min(64 * 1024 * 1024) as usize;
        let mut bytes = Vec::with_capacity(capacity);
        self.reader
            .read_to_end(&mut bytes)
            .await
            .map_err(|err| UpdaterError::transport("reading payload from", &self.locator, err))?;

        if let Some(announced) = self.content_length {
            if announced != bytes.len() as u64 {
                tracing::debug!(
                    locator = %self.locator,
                    announced,
                    actual = bytes.len(),
                    "payload length differs from the announced length"
                );
            }
        }
        Ok(bytes)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("content_length", &self.content_length)
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

/// Capability to resolve, download and authenticate releases.
#[async_trait]
pub trait Source: Send + Sync {
    /// Resolve the newest release for the running platform.
    ///
    /// Sources that resolve a download locator remember it, so call this
    /// before [`get`](Self::get) and [`get_signature`](Self::get_signature).
    async fn latest_version(&self) -> Result<Version>;

    /// Open the payload of `version` for download.
    async fn get(&self, version: &Version) -> Result<Payload>;

    /// Fetch the detached signature of the payload of `version`.
    async fn get_signature(&self, version: &Version) -> Result<Signature>;
}

#[async_trait]
impl<S> Source for Box<S>
where
    S: Source + ?Sized,
{
    async fn latest_version(&self) -> Result<Version> {
        (**self).latest_version().await
    }

    async fn get(&self, version: &Version) -> Result<Payload> {
        (**self).get(version).await
    }

    async fn get_signature(&self, version: &Version) -> Result<Signature> {
        (**self).get_signature(version).await
    }
}

/// Read a detached signature as one atomic unit.
///
/// Both the announced length and the number of bytes actually transferred
/// must be exactly [`SIGNATURE_LEN`]; no more than one extra byte is read.
pub async fn read_signature<R>(
    reader: R,
    announced: Option<u64>,
    locator: &str,
) -> Result<Signature>
where
    R: AsyncRead + Unpin,
{
    if let Some(length) = announced {
        if length != SIGNATURE_LEN as u64 {
            return Err(UpdaterError::InvalidSignatureLength { actual: length });
        }
    }

    let mut buffer = Vec::with_capacity(SIGNATURE_LEN + 1);
    reader
        .take(SIGNATURE_LEN as u64 + 1)
        .read_to_end(&mut buffer)
        .await
        .map_err(|err| UpdaterError::transport("reading signature from", locator, err))?;

    Signature::from_slice(&buffer)
}

/// Address of the signature belonging to a payload locator.
pub fn signature_locator(payload_locator: &str) -> String {
    format!("{payload_locator}.{}", crate::verify::SIGNATURE_EXTENSION)
}
