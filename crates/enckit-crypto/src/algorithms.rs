//! Symmetric algorithm identifiers and their size parameters

use std::fmt;
use std::str::FromStr;

use crate::error::CryptoError;
use crate::{AES_BLOCK_SIZE, TAG_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymmetricAlgorithm {
    A128Cbc,
    A192Cbc,
    A256Cbc,
    A128CbcNoPad,
    A192CbcNoPad,
    A256CbcNoPad,
    A128Gcm,
    A192Gcm,
    A256Gcm,
    A128CbcHs256,
    A192CbcHs384,
    A256CbcHs512,
    A128Kw,
    A192Kw,
    A256Kw,
    ChaCha20Poly1305,
    XChaCha20Poly1305,
}

impl SymmetricAlgorithm {
    pub const ALL: [SymmetricAlgorithm; 17] = [
        Self::A128Cbc,
        Self::A192Cbc,
        Self::A256Cbc,
        Self::A128CbcNoPad,
        Self::A192CbcNoPad,
        Self::A256CbcNoPad,
        Self::A128Gcm,
        Self::A192Gcm,
        Self::A256Gcm,
        Self::A128CbcHs256,
        Self::A192CbcHs384,
        Self::A256CbcHs512,
        Self::A128Kw,
        Self::A192Kw,
        Self::A256Kw,
        Self::ChaCha20Poly1305,
        Self::XChaCha20Poly1305,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A128Cbc => "A128CBC",
            Self::A192Cbc => "A192CBC",
            Self::A256Cbc => "A256CBC",
            Self::A128CbcNoPad => "A128CBC-NOPAD",
            Self::A192CbcNoPad => "A192CBC-NOPAD",
            Self::A256CbcNoPad => "A256CBC-NOPAD",
            Self::A128Gcm => "A128GCM",
            Self::A192Gcm => "A192GCM",
            Self::A256Gcm => "A256GCM",
            Self::A128CbcHs256 => "A128CBC-HS256",
            Self::A192CbcHs384 => "A192CBC-HS384",
            Self::A256CbcHs512 => "A256CBC-HS512",
            Self::A128Kw => "A128KW",
            Self::A192Kw => "A192KW",
            Self::A256Kw => "A256KW",
            Self::ChaCha20Poly1305 => "C20P",
            Self::XChaCha20Poly1305 => "XC20P",
        }
    }

    /// Required key size in bytes.
    pub fn key_size(&self) -> usize {
        match self {
            Self::A128Cbc | Self::A128CbcNoPad | Self::A128Gcm | Self::A128Kw => 16,
            Self::A192Cbc | Self::A192CbcNoPad | Self::A192Gcm | Self::A192Kw => 24,
            Self::A256Cbc | Self::A256CbcNoPad | Self::A256Gcm | Self::A256Kw => 32,
            Self::A128CbcHs256 => 32,
            Self::A192CbcHs384 => 48,
            Self::A256CbcHs512 => 64,
            Self::ChaCha20Poly1305 | Self::XChaCha20Poly1305 => 32,
        }
    }

    /// Required nonce (IV) size in bytes; 0 for key wrap.
    pub fn nonce_size(&self) -> usize {
        match self {
            Self::A128Cbc
            | Self::A192Cbc
            | Self::A256Cbc
            | Self::A128CbcNoPad
            | Self::A192CbcNoPad
            | Self::A256CbcNoPad
            | Self::A128CbcHs256
            | Self::A192CbcHs384
            | Self::A256CbcHs512 => AES_BLOCK_SIZE,
            Self::A128Gcm | Self::A192Gcm | Self::A256Gcm | Self::ChaCha20Poly1305 => 12,
            Self::XChaCha20Poly1305 => 24,
            Self::A128Kw | Self::A192Kw | Self::A256Kw => 0,
        }
    }

    /// Detached tag size in bytes; 0 for algorithms without a tag.
    pub fn tag_size(&self) -> usize {
        match self {
            Self::A128Gcm | Self::A192Gcm | Self::A256Gcm => TAG_SIZE,
            Self::ChaCha20Poly1305 | Self::XChaCha20Poly1305 => TAG_SIZE,
            Self::A128CbcHs256 => 16,
            Self::A192CbcHs384 => 24,
            Self::A256CbcHs512 => 32,
            _ => 0,
        }
    }

    pub fn is_aead(&self) -> bool {
        self.tag_size() > 0
    }
}

impl FromStr for SymmetricAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|alg| alg.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl fmt::Display for SymmetricAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
