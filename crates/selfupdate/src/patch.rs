//! Reconstruction of the new executable from a verified payload.

use crate::error::{Result, UpdaterError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What a release payload contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// The complete new executable.
    #[default]
    Full,
    /// A bsdiff patch against the currently running executable.
    Bsdiff,
}

impl PayloadFormat {
    /// Whether the payload must be applied against the current executable.
    pub fn is_delta(self) -> bool {
        matches!(self, PayloadFormat::Bsdiff)
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Produce the bytes of the new executable.
///
/// `payload` must already have passed signature verification. A delta is
/// applied to `current` (the byte-exact running executable) and its output is
/// only accepted if it hashes to `expected_sha256`.
pub fn reconstruct(
    format: PayloadFormat,
    payload: Vec<u8>,
    current: Option<&[u8]>,
    expected_sha256: Option<&str>,
) -> Result<Vec<u8>> {
    if payload.is_empty() {
        return Err(UpdaterError::EmptyPayload);
    }

    let produced = match format {
        PayloadFormat::Full => payload,
        PayloadFormat::Bsdiff => {
            if expected_sha256.is_none() {
                return Err(UpdaterError::PatchFailed(
                    "delta release does not declare the sha256 of its output".into(),
                ));
            }
            let current = current.ok_or_else(|| {
                UpdaterError::PatchFailed("current executable is not available".into())
            })?;
            let mut output = Vec::with_capacity(current.len());
            bsdiff::patch(current, &mut payload.as_slice(), &mut output)
                .map_err(|err| UpdaterError::PatchFailed(err.to_string()))?;
            output
        }
    };

    if let Some(expected) = expected_sha256 {
        check_digest(&produced, expected)?;
    }
    if produced.is_empty() {
        return Err(UpdaterError::EmptyPayload);
    }
    Ok(produced)
}

fn check_digest(bytes: &[u8], expected: &str) -> Result<()> {
    let actual = sha256_hex(bytes);
    let expected = expected.trim().to_ascii_lowercase();
    if actual != expected {
        return Err(UpdaterError::IntegrityMismatch { expected, actual });
    }
    Ok(())
}
