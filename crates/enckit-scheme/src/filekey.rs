//! Per-document key material
//!
//! ```text
//! file key (32 random bytes) ──┬─ HKDF-SHA256(salt=∅,           info="header")  → header key
//!                              └─ HKDF-SHA256(salt=nonce prefix, info="payload") → payload key
//!
//! segment nonce = nonce prefix (7) || segment counter (4, BE) || last flag (1)
//! ```
//!
//! The nonce prefix is fresh per document and the counter/flag pair is unique
//! per segment, so no nonce repeats under one payload key. The last flag binds
//! the end of the stream: a truncated stream cannot present an earlier segment
//! as the final one.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::ChaCha20Poly1305;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::algorithms::Cipher;
use crate::error::{SchemeError, SchemeResult};
use crate::{FILE_KEY_SIZE, NONCE_PREFIX_LENGTH, SCHEME_NAME, SEGMENT_SIZE};

type HmacSha256 = Hmac<Sha256>;

const DERIVED_KEY_SIZE: usize = 32;
const SEGMENT_NONCE_SIZE: usize = 12;

enum SegmentCipher {
    AesGcm(Box<Aes256Gcm>),
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
}

pub struct FileKey {
    cipher: Cipher,
    file_key: [u8; FILE_KEY_SIZE],
    nonce_prefix: [u8; NONCE_PREFIX_LENGTH],
    header_key: [u8; DERIVED_KEY_SIZE],
    payload_key: [u8; DERIVED_KEY_SIZE],
    aead: SegmentCipher,
}

impl FileKey {
    /// Fresh file key and nonce prefix from the OS random source.
    pub fn generate(cipher: Cipher) -> SchemeResult<Self> {
        let mut seed = [0u8; FILE_KEY_SIZE + NONCE_PREFIX_LENGTH];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| SchemeError::Random(e.to_string()))?;

        let key = Self::import(&seed[..FILE_KEY_SIZE], &seed[FILE_KEY_SIZE..], cipher);
        seed.zeroize();
        key
    }

    /// Rebuild the key material from a known file key and nonce prefix.
    ///
    /// Deterministic: the same inputs always derive the same header and payload keys.
    pub fn import(file_key: &[u8], nonce_prefix: &[u8], cipher: Cipher) -> SchemeResult<Self> {
        let file_key: [u8; FILE_KEY_SIZE] =
            file_key.try_into().map_err(|_| SchemeError::InvalidFileKey {
                expected: FILE_KEY_SIZE,
                found: file_key.len(),
            })?;
        let nonce_prefix: [u8; NONCE_PREFIX_LENGTH] =
            nonce_prefix.try_into().map_err(|_| SchemeError::InvalidNoncePrefix {
                expected: NONCE_PREFIX_LENGTH,
                found: nonce_prefix.len(),
            })?;

        let header_key = hkdf_derive(&file_key, None, b"header")?;
        let payload_key = hkdf_derive(&file_key, Some(&nonce_prefix), b"payload")?;

        let aead = match cipher {
            Cipher::AesGcm => SegmentCipher::AesGcm(Box::new(
                Aes256Gcm::new_from_slice(&payload_key)
                    .map_err(|e| SchemeError::KeyDerivation(e.to_string()))?,
            )),
            Cipher::ChaCha20Poly1305 => SegmentCipher::ChaCha20Poly1305(Box::new(
                ChaCha20Poly1305::new_from_slice(&payload_key)
                    .map_err(|e| SchemeError::KeyDerivation(e.to_string()))?,
            )),
        };

        Ok(Self {
            cipher,
            file_key,
            nonce_prefix,
            header_key,
            payload_key,
            aead,
        })
    }

    pub fn cipher(&self) -> Cipher {
        self.cipher
    }

    pub fn nonce_prefix(&self) -> &[u8; NONCE_PREFIX_LENGTH] {
        &self.nonce_prefix
    }

    /// Raw file key, handed to the wrapping callback only.
    pub(crate) fn secret(&self) -> &[u8; FILE_KEY_SIZE] {
        &self.file_key
    }

    /// Build the signed header: `scheme\nmanifest\nbase64(HMAC)\n`.
    pub fn sign_header(&self, manifest: &[u8]) -> SchemeResult<Vec<u8>> {
        let mut header = signed_message(manifest);
        let mut mac = self.header_mac()?;
        mac.update(&header);
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        header.extend_from_slice(signature.as_bytes());
        header.push(b'\n');

        if header.len() > SEGMENT_SIZE {
            return Err(SchemeError::HeaderTooLarge { max: SEGMENT_SIZE });
        }
        Ok(header)
    }

    /// Check a decoded header MAC in constant time.
    pub fn verify_header_signature(&self, manifest: &[u8], signature: &[u8]) -> SchemeResult<()> {
        let mut mac = self.header_mac()?;
        mac.update(&signed_message(manifest));
        mac.verify_slice(signature)
            .map_err(|_| SchemeError::InvalidSignature)
    }

    /// Encrypt one segment in place; `buf` holds the plaintext and receives
    /// `ciphertext || tag`.
    pub fn encrypt_segment(&self, buf: &mut Vec<u8>, segment: u32, last: bool) -> SchemeResult<()> {
        let nonce = self.nonce_for_segment(segment, last);
        let sealed = match &self.aead {
            SegmentCipher::AesGcm(c) => {
                c.encrypt_in_place(aes_gcm::Nonce::from_slice(&nonce), b"", buf)
            }
            SegmentCipher::ChaCha20Poly1305(c) => {
                c.encrypt_in_place(chacha20poly1305::Nonce::from_slice(&nonce), b"", buf)
            }
        };
        sealed.map_err(|_| SchemeError::EncryptionFailed { segment })
    }

    /// Decrypt one segment in place. On failure `buf` is cleared so no
    /// unauthenticated bytes escape.
    pub fn decrypt_segment(&self, buf: &mut Vec<u8>, segment: u32, last: bool) -> SchemeResult<()> {
        let nonce = self.nonce_for_segment(segment, last);
        let opened = match &self.aead {
            SegmentCipher::AesGcm(c) => {
                c.decrypt_in_place(aes_gcm::Nonce::from_slice(&nonce), b"", buf)
            }
            SegmentCipher::ChaCha20Poly1305(c) => {
                c.decrypt_in_place(chacha20poly1305::Nonce::from_slice(&nonce), b"", buf)
            }
        };
        opened.map_err(|_| {
            buf.zeroize();
            buf.clear();
            SchemeError::DecryptionFailed { segment }
        })
    }

    pub fn nonce_for_segment(&self, segment: u32, last: bool) -> [u8; SEGMENT_NONCE_SIZE] {
        let mut nonce = [0u8; SEGMENT_NONCE_SIZE];
        nonce[..NONCE_PREFIX_LENGTH].copy_from_slice(&self.nonce_prefix);
        nonce[NONCE_PREFIX_LENGTH..SEGMENT_NONCE_SIZE - 1].copy_from_slice(&segment.to_be_bytes());
        nonce[SEGMENT_NONCE_SIZE - 1] = u8::from(last);
        nonce
    }

    fn header_mac(&self) -> SchemeResult<HmacSha256> {
        <HmacSha256 as Mac>::new_from_slice(&self.header_key)
            .map_err(|e| SchemeError::KeyDerivation(e.to_string()))
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.file_key.zeroize();
        self.header_key.zeroize();
        self.payload_key.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey")
            .field("cipher", &self.cipher)
            .field("nonce_prefix", &self.nonce_prefix)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

fn signed_message(manifest: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(SCHEME_NAME.len() + manifest.len() + 2);
    message.extend_from_slice(SCHEME_NAME.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(manifest);
    message.push(b'\n');
    message
}

fn hkdf_derive(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
) -> SchemeResult<[u8; DERIVED_KEY_SIZE]> {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = [0u8; DERIVED_KEY_SIZE];
    hkdf.expand(info, &mut okm)
        .map_err(|e| SchemeError::KeyDerivation(e.to_string()))?;
    Ok(okm)
}
