//! AES-CBC + HMAC-SHA2 composite AEAD (RFC 7518 section 5.2)
//!
//! Key layout: `MAC_KEY || ENC_KEY`, each half of the input key.
//! Sealed layout: `CBC(PKCS#7, plaintext) || T`, where
//! ```text
//! AL = bit length of AAD, 64-bit big-endian
//! T  = HMAC(MAC_KEY, AAD || IV || ciphertext || AL)[..tag_size]
//! ```
//! The tag is verified before any CBC decryption, so padding errors are only
//! reachable with authentic input.

use hmac::digest::core_api::BlockSizeUser;
use hmac::digest::Digest;
use hmac::{Mac, SimpleHmac};
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::algorithms::SymmetricAlgorithm;
use crate::error::{CryptoError, CryptoResult};
use crate::symmetric::{cbc_decrypt, cbc_encrypt};
use crate::AES_BLOCK_SIZE;

/// IV size shared by every variant
pub const NONCE_SIZE: usize = AES_BLOCK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CbcHmacVariant {
    /// A128CBC-HS256
    Aes128Sha256,
    /// A192CBC-HS384
    Aes192Sha384,
    /// A256CBC-HS512
    Aes256Sha512,
}

impl CbcHmacVariant {
    pub fn from_algorithm(algorithm: SymmetricAlgorithm) -> Option<Self> {
        match algorithm {
            SymmetricAlgorithm::A128CbcHs256 => Some(Self::Aes128Sha256),
            SymmetricAlgorithm::A192CbcHs384 => Some(Self::Aes192Sha384),
            SymmetricAlgorithm::A256CbcHs512 => Some(Self::Aes256Sha512),
            _ => None,
        }
    }

    /// Combined MAC + encryption key size.
    pub fn key_size(&self) -> usize {
        match self {
            Self::Aes128Sha256 => 32,
            Self::Aes192Sha384 => 48,
            Self::Aes256Sha512 => 64,
        }
    }

    /// Truncated tag size, which is also the AEAD overhead.
    pub fn tag_size(&self) -> usize {
        self.key_size() / 2
    }
}

/// AES-CBC-HMAC AEAD with append-style `seal`/`open`.
pub struct AesCbcHmac {
    variant: CbcHmacVariant,
    mac_key: Zeroizing<Vec<u8>>,
    enc_key: Zeroizing<Vec<u8>>,
}

impl AesCbcHmac {
    pub fn new(variant: CbcHmacVariant, key: &[u8]) -> CryptoResult<Self> {
        if key.len() != variant.key_size() {
            return Err(CryptoError::InvalidKeySize {
                expected: variant.key_size(),
                found: key.len(),
            });
        }
        let (mac_key, enc_key) = key.split_at(key.len() / 2);
        Ok(Self {
            variant,
            mac_key: Zeroizing::new(mac_key.to_vec()),
            enc_key: Zeroizing::new(enc_key.to_vec()),
        })
    }

    pub fn variant(&self) -> CbcHmacVariant {
        self.variant
    }

    pub fn nonce_size(&self) -> usize {
        NONCE_SIZE
    }

    pub fn overhead(&self) -> usize {
        self.variant.tag_size()
    }

    /// Encrypt and authenticate `plaintext`, appending `ciphertext || tag` to `dst`.
    pub fn seal(
        &self,
        dst: &mut Vec<u8>,
        nonce: &[u8],
        plaintext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<()> {
        self.check_nonce(nonce)?;
        let ciphertext = cbc_encrypt(&self.enc_key, nonce, plaintext, true)?;
        let tag = self.compute_tag(aad, nonce, &ciphertext)?;

        dst.reserve(ciphertext.len() + tag.len());
        dst.extend_from_slice(&ciphertext);
        dst.extend_from_slice(&tag);
        Ok(())
    }

    /// Verify and decrypt `ciphertext || tag`, appending the plaintext to `dst`.
    ///
    /// `dst` is left untouched on failure.
    pub fn open(
        &self,
        dst: &mut Vec<u8>,
        nonce: &[u8],
        sealed: &[u8],
        aad: &[u8],
    ) -> CryptoResult<()> {
        self.check_nonce(nonce)?;
        let tag_size = self.overhead();
        if sealed.len() < tag_size + AES_BLOCK_SIZE
            || (sealed.len() - tag_size) % AES_BLOCK_SIZE != 0
        {
            return Err(CryptoError::InvalidCiphertextLength(sealed.len()));
        }

        let (ciphertext, tag) = sealed.split_at(sealed.len() - tag_size);
        self.verify_tag(aad, nonce, ciphertext, tag)?;

        let plaintext = Zeroizing::new(cbc_decrypt(&self.enc_key, nonce, ciphertext, true)?);
        dst.extend_from_slice(&plaintext);
        Ok(())
    }

    fn check_nonce(&self, nonce: &[u8]) -> CryptoResult<()> {
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength {
                expected: NONCE_SIZE,
                found: nonce.len(),
            });
        }
        Ok(())
    }

    fn compute_tag(&self, aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        let al = aad_bit_length(aad);
        let parts: [&[u8]; 4] = [aad, iv, ciphertext, &al];
        let mut full = match self.variant {
            CbcHmacVariant::Aes128Sha256 => mac_over::<Sha256>(&self.mac_key, &parts)?
                .finalize()
                .into_bytes()
                .to_vec(),
            CbcHmacVariant::Aes192Sha384 => mac_over::<Sha384>(&self.mac_key, &parts)?
                .finalize()
                .into_bytes()
                .to_vec(),
            CbcHmacVariant::Aes256Sha512 => mac_over::<Sha512>(&self.mac_key, &parts)?
                .finalize()
                .into_bytes()
                .to_vec(),
        };
        full.truncate(self.overhead());
        Ok(full)
    }

    fn verify_tag(&self, aad: &[u8], iv: &[u8], ciphertext: &[u8], tag: &[u8]) -> CryptoResult<()> {
        let al = aad_bit_length(aad);
        let parts: [&[u8]; 4] = [aad, iv, ciphertext, &al];
        let verified = match self.variant {
            CbcHmacVariant::Aes128Sha256 => {
                mac_over::<Sha256>(&self.mac_key, &parts)?.verify_truncated_left(tag)
            }
            CbcHmacVariant::Aes192Sha384 => {
                mac_over::<Sha384>(&self.mac_key, &parts)?.verify_truncated_left(tag)
            }
            CbcHmacVariant::Aes256Sha512 => {
                mac_over::<Sha512>(&self.mac_key, &parts)?.verify_truncated_left(tag)
            }
        };
        verified.map_err(|_| CryptoError::AuthenticationFailed)
    }
}

impl std::fmt::Debug for AesCbcHmac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCbcHmac")
            .field("variant", &self.variant)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn aad_bit_length(aad: &[u8]) -> [u8; 8] {
    ((aad.len() as u64) * 8).to_be_bytes()
}

fn mac_over<D>(key: &[u8], parts: &[&[u8]]) -> CryptoResult<SimpleHmac<D>>
where
    D: Digest + BlockSizeUser,
{
    // HMAC accepts keys of any length; this only fails for broken digests.
    let mut mac = <SimpleHmac<D> as Mac>::new_from_slice(key).map_err(|_| {
        CryptoError::InvalidKeySize {
            expected: <D as BlockSizeUser>::block_size(),
            found: key.len(),
        }
    })?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac)
}
