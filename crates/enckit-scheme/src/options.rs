//! Caller-supplied configuration for [`encrypt`](crate::encrypt) and
//! [`decrypt`](crate::decrypt)
//!
//! Key wrapping is delegated: this crate never sees a key-encryption key,
//! only the callbacks that use one.

use std::fmt;
use std::sync::Arc;

/// Output of a [`WrapKeyFn`].
#[derive(Clone, Default)]
pub struct WrappedKey {
    pub wrapped: Vec<u8>,
    /// Detached tag, if the wrapping algorithm produces one. It is appended
    /// to `wrapped` before being stored in the manifest.
    pub tag: Option<Vec<u8>>,
}

impl fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedKey")
            .field("wrapped_len", &self.wrapped.len())
            .field("tag_len", &self.tag.as_ref().map(Vec::len))
            .finish()
    }
}

impl From<Vec<u8>> for WrappedKey {
    fn from(wrapped: Vec<u8>) -> Self {
        Self { wrapped, tag: None }
    }
}

/// Wraps the plaintext file key.
///
/// Arguments: `(plaintext_key, algorithm, key_name, nonce)`. `algorithm` is
/// the canonical name (aliases already resolved). No nonce is passed by the
/// stream encryptor.
pub type WrapKeyFn =
    Arc<dyn Fn(&[u8], &str, &str, Option<&[u8]>) -> anyhow::Result<WrappedKey> + Send + Sync>;

/// Unwraps a file key read from a manifest.
///
/// Arguments: `(wrapped_key, algorithm, key_name, nonce, tag)`. Must return
/// the 32-byte plaintext file key.
pub type UnwrapKeyFn = Arc<
    dyn Fn(&[u8], &str, &str, Option<&[u8]>, Option<&[u8]>) -> anyhow::Result<Vec<u8>>
        + Send
        + Sync,
>;

#[derive(Clone, Default)]
pub struct EncryptOptions {
    pub wrap_key_fn: Option<WrapKeyFn>,
    /// Key passed to `wrap_key_fn`; required unless `omit_key_name` is set.
    pub key_name: String,
    /// Key-wrapping algorithm name, e.g. `"A256KW"` or `"AES"`.
    pub algorithm: String,
    /// Payload cipher name; AES-GCM when unset.
    pub cipher: Option<String>,
    /// Key name written to the manifest in place of `key_name`.
    pub decryption_key_name: Option<String>,
    /// Leave the key name out of the manifest entirely.
    pub omit_key_name: bool,
}

impl EncryptOptions {
    pub fn new(wrap_key_fn: WrapKeyFn, key_name: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self {
            wrap_key_fn: Some(wrap_key_fn),
            key_name: key_name.into(),
            algorithm: algorithm.into(),
            ..Default::default()
        }
    }

    pub fn with_cipher(mut self, cipher: impl Into<String>) -> Self {
        self.cipher = Some(cipher.into());
        self
    }

    pub fn with_decryption_key_name(mut self, name: impl Into<String>) -> Self {
        self.decryption_key_name = Some(name.into());
        self
    }

    pub fn with_omit_key_name(mut self, omit: bool) -> Self {
        self.omit_key_name = omit;
        self
    }

    /// The key name recorded in the manifest, if any.
    pub(crate) fn manifest_key_name(&self) -> Option<String> {
        if self.omit_key_name {
            return None;
        }
        let name = self
            .decryption_key_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.key_name);
        (!name.is_empty()).then(|| name.to_string())
    }
}

impl fmt::Debug for EncryptOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptOptions")
            .field("wrap_key_fn", &self.wrap_key_fn.as_ref().map(|_| "<fn>"))
            .field("key_name", &self.key_name)
            .field("algorithm", &self.algorithm)
            .field("cipher", &self.cipher)
            .field("decryption_key_name", &self.decryption_key_name)
            .field("omit_key_name", &self.omit_key_name)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct DecryptOptions {
    pub unwrap_key_fn: Option<UnwrapKeyFn>,
    /// Overrides the key name stored in the manifest.
    pub key_name: Option<String>,
}

impl DecryptOptions {
    pub fn new(unwrap_key_fn: UnwrapKeyFn) -> Self {
        Self {
            unwrap_key_fn: Some(unwrap_key_fn),
            key_name: None,
        }
    }

    pub fn with_key_name(mut self, name: impl Into<String>) -> Self {
        self.key_name = Some(name.into());
        self
    }

    /// Options win over the manifest; empty names count as absent.
    pub(crate) fn resolve_key_name<'a>(&'a self, manifest_name: Option<&'a str>) -> Option<&'a str> {
        self.key_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(manifest_name)
    }
}

impl fmt::Debug for DecryptOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptOptions")
            .field("unwrap_key_fn", &self.unwrap_key_fn.as_ref().map(|_| "<fn>"))
            .field("key_name", &self.key_name)
            .finish()
    }
}
