use std::io;

use thiserror::Error;

use crate::algorithms::AlgorithmError;
use crate::manifest::ManifestError;

pub type SchemeResult<T> = Result<T, SchemeError>;

#[derive(Debug, Error)]
pub enum SchemeError {
    // Configuration errors, reported before any I/O.
    #[error("option wrap_key_fn is required")]
    WrapKeyFnMissing,

    #[error("option unwrap_key_fn is required")]
    UnwrapKeyFnMissing,

    #[error("option key_name is required unless omit_key_name is set")]
    KeyNameMissing,

    #[error("option algorithm is invalid: {0}")]
    InvalidAlgorithm(#[source] AlgorithmError),

    #[error("option cipher is invalid: {0}")]
    InvalidCipher(#[source] AlgorithmError),

    #[error("failed to wrap the file key: {0}")]
    WrapKey(#[source] anyhow::Error),

    #[error("failed to generate random bytes: {0}")]
    Random(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid file key: expected {expected} bytes, got {found}")]
    InvalidFileKey { expected: usize, found: usize },

    #[error("invalid nonce prefix: expected {expected} bytes, got {found}")]
    InvalidNoncePrefix { expected: usize, found: usize },

    // Format errors in the clear-text header.
    #[error("unsupported scheme")]
    UnsupportedScheme,

    #[error("manifest not found")]
    ManifestNotFound,

    #[error("invalid manifest: {0}")]
    InvalidManifest(#[source] ManifestError),

    #[error("signature not found")]
    SignatureNotFound,

    #[error("invalid signature format")]
    InvalidSignatureFormat,

    #[error("header exceeds the maximum size of {max} bytes")]
    HeaderTooLarge { max: usize },

    #[error("decryption key missing: no key name in the manifest or the options")]
    DecryptionKeyMissing,

    // Authentication errors; deliberately coarse.
    #[error("failed to validate the document's signature")]
    InvalidSignature,

    #[error("encryption failed at segment {segment}")]
    EncryptionFailed { segment: u32 },

    #[error("decryption failed at segment {segment}")]
    DecryptionFailed { segment: u32 },

    #[error("segment counter exhausted")]
    SegmentCounterExhausted,

    #[error("stream is unusable after a previous error")]
    StreamPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SchemeError {
    /// Recover a `SchemeError` carried inside an `io::Error` returned by a stream.
    pub fn from_io(err: &io::Error) -> Option<&SchemeError> {
        err.get_ref()?.downcast_ref::<SchemeError>()
    }

    /// Errors that come from parsing or authenticating the header.
    pub fn is_header_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedScheme
                | Self::ManifestNotFound
                | Self::InvalidManifest(_)
                | Self::SignatureNotFound
                | Self::InvalidSignatureFormat
                | Self::HeaderTooLarge { .. }
                | Self::DecryptionKeyMissing
                | Self::InvalidSignature
        )
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            Self::UnsupportedScheme
            | Self::ManifestNotFound
            | Self::InvalidManifest(_)
            | Self::SignatureNotFound
            | Self::InvalidSignatureFormat
            | Self::HeaderTooLarge { .. }
            | Self::InvalidSignature
            | Self::DecryptionFailed { .. } => io::ErrorKind::InvalidData,
            Self::DecryptionKeyMissing
            | Self::WrapKeyFnMissing
            | Self::UnwrapKeyFnMissing
            | Self::KeyNameMissing
            | Self::InvalidAlgorithm(_)
            | Self::InvalidCipher(_) => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        }
    }
}

/// Upstream I/O errors pass through unchanged; everything else is wrapped so
/// callers can recover it with [`SchemeError::from_io`].
impl From<SchemeError> for io::Error {
    fn from(err: SchemeError) -> Self {
        match err {
            SchemeError::Io(inner) => inner,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}
