//! Clear-text document manifest
//!
//! Serialized as compact JSON on the second header line:
//! ```text
//! {"k":"mykey","kw":1,"wfk":"<base64>","cph":1,"np":"<base64>"}
//! ```
//! - `k`   key name for unwrapping (omitted when empty)
//! - `kw`  key-wrapping algorithm ID
//! - `wfk` wrapped file key
//! - `cph` payload cipher ID
//! - `np`  7-byte nonce prefix
//!
//! No field may be trusted before [`Manifest::validate`] succeeds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algorithms::{Cipher, KeyAlgorithm};
use crate::NONCE_PREFIX_LENGTH;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wrapped file key is empty")]
    MissingWrappedKey,

    #[error("nonce prefix must be {expected} bytes, got {found}")]
    InvalidNoncePrefix { expected: usize, found: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Name of the key that unwraps `wfk`
    #[serde(rename = "k", default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(rename = "kw")]
    pub key_wrapping_algorithm: KeyAlgorithm,
    /// Wrapped file key, opaque to this layer
    #[serde(rename = "wfk", with = "base64_bytes")]
    pub wfk: Vec<u8>,
    #[serde(rename = "cph")]
    pub cipher: Cipher,
    #[serde(rename = "np", with = "base64_bytes")]
    pub nonce_prefix: Vec<u8>,
}

impl Manifest {
    /// Check the manifest invariants, resolving algorithm aliases in place.
    pub fn validate(&mut self) -> Result<(), ManifestError> {
        self.key_wrapping_algorithm = self.key_wrapping_algorithm.resolve();

        if self.wfk.is_empty() {
            return Err(ManifestError::MissingWrappedKey);
        }
        if self.nonce_prefix.len() != NONCE_PREFIX_LENGTH {
            return Err(ManifestError::InvalidNoncePrefix {
                expected: NONCE_PREFIX_LENGTH,
                found: self.nonce_prefix.len(),
            });
        }
        Ok(())
    }

    /// Key name recorded in the manifest, treating an empty name as absent.
    pub fn key_name(&self) -> Option<&str> {
        self.key_name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ManifestError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse without validating.
    pub fn from_json(data: &[u8]) -> Result<Self, ManifestError> {
        Ok(serde_json::from_slice(data)?)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
