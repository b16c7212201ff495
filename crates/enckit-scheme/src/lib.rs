//! enckit-scheme: streaming authenticated encryption, `dapr.io/enc/v1`
//!
//! An encrypted document is a clear-text header followed by payload segments:
//!
//! ```text
//! dapr.io/enc/v1\n
//! {"k":"mykey","kw":1,"wfk":"...","cph":1,"np":"..."}\n
//! base64(HMAC-SHA256(header key, "dapr.io/enc/v1\n<manifest>\n"))\n
//! segment 0 ‖ segment 1 ‖ ... ‖ segment n (last)
//! ```
//!
//! Every segment carries up to 64 KiB of plaintext plus a 16-byte AEAD tag.
//! Each document gets a fresh random file key; the caller supplies a callback
//! that wraps it with their own key-encryption key, and the wrapped form is
//! stored in the manifest.
//!
//! Both directions are pull-based [`std::io::Read`] adapters, so a caller can
//! process arbitrarily large inputs with bounded memory:
//!
//! ```no_run
//! # use std::io::Read;
//! # fn demo(opts: enckit_scheme::EncryptOptions, dopts: enckit_scheme::DecryptOptions)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let mut sealed = Vec::new();
//! enckit_scheme::encrypt(&b"hello world"[..], opts)?.read_to_end(&mut sealed)?;
//!
//! let mut plain = Vec::new();
//! enckit_scheme::decrypt(&sealed[..], dopts)?.read_to_end(&mut plain)?;
//! # Ok(()) }
//! ```

pub mod algorithms;
pub mod error;
pub mod filekey;
pub mod header;
pub mod manifest;
pub mod options;
pub mod stream;

pub use algorithms::{AlgorithmError, Cipher, KeyAlgorithm};
pub use error::{SchemeError, SchemeResult};
pub use filekey::FileKey;
pub use header::{read_header, Header};
pub use manifest::{Manifest, ManifestError};
pub use options::{DecryptOptions, EncryptOptions, UnwrapKeyFn, WrapKeyFn, WrappedKey};
pub use stream::{decrypt, encrypt, DecryptReader, EncryptReader};

/// First line of every encrypted document.
pub const SCHEME_NAME: &str = "dapr.io/enc/v1";

/// Plaintext bytes per segment; also the cap on the header size.
pub const SEGMENT_SIZE: usize = 64 << 10;

/// AEAD tag appended to every segment.
pub const SEGMENT_OVERHEAD: usize = 16;

/// Random per-document prefix of every segment nonce.
pub const NONCE_PREFIX_LENGTH: usize = 7;

/// Length of the random per-document file key.
pub const FILE_KEY_SIZE: usize = 32;
