//! enckit-crypto: symmetric cipher suite
//!
//! Uniform entry points keyed by an algorithm identifier:
//! ```text
//! A128CBC / A192CBC / A256CBC                 AES-CBC, PKCS#7 padding
//! A128CBC-NOPAD / A192CBC-NOPAD / ...         AES-CBC, block-aligned input only
//! A128GCM / A192GCM / A256GCM                 AES-GCM (12-byte nonce, 16-byte tag)
//! A128CBC-HS256 / A192CBC-HS384 / ...         AES-CBC + HMAC-SHA2 composite AEAD
//! A128KW / A192KW / A256KW                    AES key wrap (RFC 3394), no nonce/tag
//! C20P / XC20P                                ChaCha20-Poly1305 / XChaCha20-Poly1305
//! ```
//!
//! AEAD algorithms return the tag detached from the ciphertext.
//!
//! `CryptoError::InvalidPadding` is reported as its own variant because
//! `decrypt_symmetric` is a low-level primitive. Network-facing callers that
//! decrypt unauthenticated CBC must not branch on it, or they reintroduce a
//! padding oracle.

pub mod aescbcaead;
pub mod algorithms;
pub mod error;
pub mod symmetric;

pub use aescbcaead::{AesCbcHmac, CbcHmacVariant};
pub use algorithms::SymmetricAlgorithm;
pub use error::{CryptoError, CryptoResult};
pub use symmetric::{decrypt, decrypt_symmetric, encrypt, encrypt_symmetric};

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// Size of a Poly1305 / GCM authentication tag
pub const TAG_SIZE: usize = 16;
