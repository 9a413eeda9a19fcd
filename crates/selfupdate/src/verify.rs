//! Detached ed25519 signature verification.

use crate::error::{Result, UpdaterError};
use ed25519_dalek::{Signature as DalekSignature, VerifyingKey, PUBLIC_KEY_LENGTH};
use std::fmt;

/// Length in bytes of a detached signature.
pub const SIGNATURE_LEN: usize = 64;

/// Extension appended to a payload locator to address its signature.
pub const SIGNATURE_EXTENSION: &str = "ed25519";

/// A raw detached signature over the exact payload bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_LEN]);

impl Signature {
    /// Build a signature from a slice that must be exactly 64 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; SIGNATURE_LEN] =
            bytes
                .try_into()
                .map_err(|_| UpdaterError::InvalidSignatureLength {
                    actual: bytes.len() as u64,
                })?;
        Ok(Signature(array))
    }

    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

/// Verify `signature` over `payload` with the raw public key `trust_root`.
///
/// Never fails loudly: a malformed key or signature simply does not verify.
pub fn verify(payload: &[u8], signature: &Signature, trust_root: &[u8; PUBLIC_KEY_LENGTH]) -> bool {
    match VerifyingKey::from_bytes(trust_root) {
        Ok(key) => verify_with(&key, payload, signature),
        Err(_) => false,
    }
}

fn verify_with(key: &VerifyingKey, payload: &[u8], signature: &Signature) -> bool {
    let signature = DalekSignature::from_bytes(signature.as_bytes());
    key.verify_strict(payload, &signature).is_ok()
}

/// The public key every update must be signed with.
#[derive(Clone, PartialEq, Eq)]
pub struct TrustRoot {
    key: VerifyingKey,
}

impl TrustRoot {
    /// Wrap an already validated key.
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Parse a raw 32-byte public key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            UpdaterError::InvalidTrustRoot(format!(
                "public key must be {PUBLIC_KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        let key = VerifyingKey::from_bytes(&array)
            .map_err(|err| UpdaterError::InvalidTrustRoot(err.to_string()))?;
        Ok(Self { key })
    }

    /// Parse a hex encoded public key.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let raw = hex::decode(encoded.trim())
            .map_err(|err| UpdaterError::InvalidTrustRoot(format!("malformed hex: {err}")))?;
        Self::from_bytes(&raw)
    }

    /// Raw public key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        self.key.as_bytes()
    }

    /// Whether `signature` is a valid signature over `payload`.
    pub fn verify(&self, payload: &[u8], signature: &Signature) -> bool {
        verify_with(&self.key, payload, signature)
    }
}

impl fmt::Debug for TrustRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrustRoot({})", hex::encode(self.key.as_bytes()))
    }
}
