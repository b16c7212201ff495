//! Algorithm-dispatched symmetric encryption and decryption
//!
//! AEAD modes return `(ciphertext, Some(tag))` with the tag detached.
//! AES-CBC and AES-KW return `(ciphertext, None)`.

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{AeadInPlace, KeyInit, Nonce, Tag};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use aes_kw::Kek;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chacha20poly1305::{ChaCha20Poly1305 as ChaChaPoly, XChaCha20Poly1305 as XChaChaPoly};

use crate::aescbcaead::{AesCbcHmac, CbcHmacVariant};
use crate::algorithms::SymmetricAlgorithm;
use crate::error::{CryptoError, CryptoResult};
use crate::AES_BLOCK_SIZE;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Encrypt `plaintext` with the algorithm named by `algorithm` (e.g. `"A256GCM"`).
pub fn encrypt_symmetric(
    plaintext: &[u8],
    algorithm: &str,
    key: &[u8],
    nonce: Option<&[u8]>,
    associated_data: Option<&[u8]>,
) -> CryptoResult<(Vec<u8>, Option<Vec<u8>>)> {
    encrypt(plaintext, algorithm.parse()?, key, nonce, associated_data)
}

/// Decrypt `ciphertext` with the algorithm named by `algorithm`.
///
/// AEAD algorithms require the detached `tag` produced by [`encrypt_symmetric`].
pub fn decrypt_symmetric(
    ciphertext: &[u8],
    algorithm: &str,
    key: &[u8],
    nonce: Option<&[u8]>,
    tag: Option<&[u8]>,
    associated_data: Option<&[u8]>,
) -> CryptoResult<Vec<u8>> {
    decrypt(ciphertext, algorithm.parse()?, key, nonce, tag, associated_data)
}

pub fn encrypt(
    plaintext: &[u8],
    algorithm: SymmetricAlgorithm,
    key: &[u8],
    nonce: Option<&[u8]>,
    associated_data: Option<&[u8]>,
) -> CryptoResult<(Vec<u8>, Option<Vec<u8>>)> {
    use SymmetricAlgorithm::*;

    check_key(algorithm, key)?;
    let nonce = check_nonce(algorithm, nonce)?;
    let aad = associated_data.unwrap_or_default();

    match algorithm {
        A128Cbc | A192Cbc | A256Cbc => Ok((cbc_encrypt(key, nonce, plaintext, true)?, None)),
        A128CbcNoPad | A192CbcNoPad | A256CbcNoPad => {
            Ok((cbc_encrypt(key, nonce, plaintext, false)?, None))
        }
        A128Gcm => seal_detached(new_aead::<Aes128Gcm>(algorithm, key)?, nonce, aad, plaintext),
        A192Gcm => seal_detached(new_aead::<Aes192Gcm>(algorithm, key)?, nonce, aad, plaintext),
        A256Gcm => seal_detached(new_aead::<Aes256Gcm>(algorithm, key)?, nonce, aad, plaintext),
        ChaCha20Poly1305 => seal_detached(
            new_aead::<ChaChaPoly>(algorithm, key)?,
            nonce,
            aad,
            plaintext,
        ),
        XChaCha20Poly1305 => seal_detached(
            new_aead::<XChaChaPoly>(algorithm, key)?,
            nonce,
            aad,
            plaintext,
        ),
        A128CbcHs256 | A192CbcHs384 | A256CbcHs512 => {
            let aead = cbc_hmac(algorithm, key)?;
            let mut sealed = Vec::with_capacity(plaintext.len() + AES_BLOCK_SIZE + aead.overhead());
            aead.seal(&mut sealed, nonce, plaintext, aad)?;
            let tag = sealed.split_off(sealed.len() - aead.overhead());
            Ok((sealed, Some(tag)))
        }
        A128Kw | A192Kw | A256Kw => Ok((key_wrap(key, plaintext)?, None)),
    }
}

pub fn decrypt(
    ciphertext: &[u8],
    algorithm: SymmetricAlgorithm,
    key: &[u8],
    nonce: Option<&[u8]>,
    tag: Option<&[u8]>,
    associated_data: Option<&[u8]>,
) -> CryptoResult<Vec<u8>> {
    use SymmetricAlgorithm::*;

    check_key(algorithm, key)?;
    let nonce = check_nonce(algorithm, nonce)?;
    let aad = associated_data.unwrap_or_default();
    let tag: &[u8] = if algorithm.is_aead() {
        check_tag(algorithm, tag)?
    } else {
        &[]
    };

    match algorithm {
        A128Cbc | A192Cbc | A256Cbc => cbc_decrypt(key, nonce, ciphertext, true),
        A128CbcNoPad | A192CbcNoPad | A256CbcNoPad => cbc_decrypt(key, nonce, ciphertext, false),
        A128Gcm => open_detached(new_aead::<Aes128Gcm>(algorithm, key)?, nonce, aad, ciphertext, tag),
        A192Gcm => open_detached(new_aead::<Aes192Gcm>(algorithm, key)?, nonce, aad, ciphertext, tag),
        A256Gcm => open_detached(new_aead::<Aes256Gcm>(algorithm, key)?, nonce, aad, ciphertext, tag),
        ChaCha20Poly1305 => open_detached(
            new_aead::<ChaChaPoly>(algorithm, key)?,
            nonce,
            aad,
            ciphertext,
            tag,
        ),
        XChaCha20Poly1305 => open_detached(
            new_aead::<XChaChaPoly>(algorithm, key)?,
            nonce,
            aad,
            ciphertext,
            tag,
        ),
        A128CbcHs256 | A192CbcHs384 | A256CbcHs512 => {
            let aead = cbc_hmac(algorithm, key)?;
            let mut sealed = Vec::with_capacity(ciphertext.len() + tag.len());
            sealed.extend_from_slice(ciphertext);
            sealed.extend_from_slice(tag);
            let mut plaintext = Vec::with_capacity(ciphertext.len());
            aead.open(&mut plaintext, nonce, &sealed, aad)?;
            Ok(plaintext)
        }
        A128Kw | A192Kw | A256Kw => key_unwrap(key, ciphertext),
    }
}

fn check_key(algorithm: SymmetricAlgorithm, key: &[u8]) -> CryptoResult<()> {
    if key.len() != algorithm.key_size() {
        return Err(CryptoError::InvalidKeySize {
            expected: algorithm.key_size(),
            found: key.len(),
        });
    }
    Ok(())
}

fn check_nonce(algorithm: SymmetricAlgorithm, nonce: Option<&[u8]>) -> CryptoResult<&[u8]> {
    let nonce = nonce.unwrap_or_default();
    if nonce.len() != algorithm.nonce_size() {
        return Err(CryptoError::InvalidNonceLength {
            expected: algorithm.nonce_size(),
            found: nonce.len(),
        });
    }
    Ok(nonce)
}

fn check_tag(algorithm: SymmetricAlgorithm, tag: Option<&[u8]>) -> CryptoResult<&[u8]> {
    let tag = tag.unwrap_or_default();
    if tag.len() != algorithm.tag_size() {
        return Err(CryptoError::InvalidTagLength {
            expected: algorithm.tag_size(),
            found: tag.len(),
        });
    }
    Ok(tag)
}

fn new_aead<A: KeyInit>(algorithm: SymmetricAlgorithm, key: &[u8]) -> CryptoResult<A> {
    A::new_from_slice(key).map_err(|_| CryptoError::InvalidKeySize {
        expected: algorithm.key_size(),
        found: key.len(),
    })
}

fn cbc_hmac(algorithm: SymmetricAlgorithm, key: &[u8]) -> CryptoResult<AesCbcHmac> {
    let variant = CbcHmacVariant::from_algorithm(algorithm)
        .ok_or_else(|| CryptoError::UnsupportedAlgorithm(algorithm.to_string()))?;
    AesCbcHmac::new(variant, key)
}

fn seal_detached<A: AeadInPlace>(
    cipher: A,
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> CryptoResult<(Vec<u8>, Option<Vec<u8>>)> {
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::<A>::from_slice(nonce), aad, &mut buffer)
        .map_err(|_| CryptoError::InvalidPlaintextLength(plaintext.len()))?;
    Ok((buffer, Some(tag.to_vec())))
}

fn open_detached<A: AeadInPlace>(
    cipher: A,
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> CryptoResult<Vec<u8>> {
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::<A>::from_slice(nonce),
            aad,
            &mut buffer,
            Tag::<A>::from_slice(tag),
        )
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    Ok(buffer)
}

macro_rules! cbc_encrypt_with {
    ($aes:ty, $padding:ty, $key:expr, $iv:expr, $data:expr) => {
        cbc::Encryptor::<$aes>::new_from_slices($key, $iv)
            .map(|enc| enc.encrypt_padded_vec_mut::<$padding>($data))
    };
}

macro_rules! cbc_decrypt_with {
    ($aes:ty, $padding:ty, $key:expr, $iv:expr, $data:expr) => {
        cbc::Decryptor::<$aes>::new_from_slices($key, $iv)
            .map(|dec| dec.decrypt_padded_vec_mut::<$padding>($data))
    };
}

/// AES-CBC encrypt; the AES variant follows the key length.
pub(crate) fn cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8], padded: bool) -> CryptoResult<Vec<u8>> {
    if !padded && data.len() % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidPlaintextLength(data.len()));
    }

    let encrypted = match (key.len(), padded) {
        (16, true) => cbc_encrypt_with!(Aes128, Pkcs7, key, iv, data),
        (16, false) => cbc_encrypt_with!(Aes128, NoPadding, key, iv, data),
        (24, true) => cbc_encrypt_with!(Aes192, Pkcs7, key, iv, data),
        (24, false) => cbc_encrypt_with!(Aes192, NoPadding, key, iv, data),
        (32, true) => cbc_encrypt_with!(Aes256, Pkcs7, key, iv, data),
        (32, false) => cbc_encrypt_with!(Aes256, NoPadding, key, iv, data),
        (found, _) => return Err(CryptoError::InvalidKeySize { expected: 32, found }),
    };

    encrypted.map_err(|_| CryptoError::InvalidNonceLength {
        expected: AES_BLOCK_SIZE,
        found: iv.len(),
    })
}

/// AES-CBC decrypt. With `padded`, a bad PKCS#7 trailer is `InvalidPadding`.
pub(crate) fn cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8], padded: bool) -> CryptoResult<Vec<u8>> {
    if data.len() % AES_BLOCK_SIZE != 0 || (padded && data.is_empty()) {
        return Err(CryptoError::InvalidCiphertextLength(data.len()));
    }

    let decrypted = match (key.len(), padded) {
        (16, true) => cbc_decrypt_with!(Aes128, Pkcs7, key, iv, data),
        (16, false) => cbc_decrypt_with!(Aes128, NoPadding, key, iv, data),
        (24, true) => cbc_decrypt_with!(Aes192, Pkcs7, key, iv, data),
        (24, false) => cbc_decrypt_with!(Aes192, NoPadding, key, iv, data),
        (32, true) => cbc_decrypt_with!(Aes256, Pkcs7, key, iv, data),
        (32, false) => cbc_decrypt_with!(Aes256, NoPadding, key, iv, data),
        (found, _) => return Err(CryptoError::InvalidKeySize { expected: 32, found }),
    };

    decrypted
        .map_err(|_| CryptoError::InvalidNonceLength {
            expected: AES_BLOCK_SIZE,
            found: iv.len(),
        })?
        .map_err(|_| CryptoError::InvalidPadding)
}

fn key_wrap(kek: &[u8], data: &[u8]) -> CryptoResult<Vec<u8>> {
    let wrapped = match kek.len() {
        16 => Kek::<Aes128>::new(GenericArray::from_slice(kek)).wrap_vec(data),
        24 => Kek::<Aes192>::new(GenericArray::from_slice(kek)).wrap_vec(data),
        32 => Kek::<Aes256>::new(GenericArray::from_slice(kek)).wrap_vec(data),
        found => return Err(CryptoError::InvalidKeySize { expected: 32, found }),
    };
    wrapped.map_err(|_| CryptoError::InvalidPlaintextLength(data.len()))
}

fn key_unwrap(kek: &[u8], data: &[u8]) -> CryptoResult<Vec<u8>> {
    let unwrapped = match kek.len() {
        16 => Kek::<Aes128>::new(GenericArray::from_slice(kek)).unwrap_vec(data),
        24 => Kek::<Aes192>::new(GenericArray::from_slice(kek)).unwrap_vec(data),
        32 => Kek::<Aes256>::new(GenericArray::from_slice(kek)).unwrap_vec(data),
        found => return Err(CryptoError::InvalidKeySize { expected: 32, found }),
    };
    unwrapped.map_err(|e| match e {
        aes_kw::Error::IntegrityCheckFailed => CryptoError::AuthenticationFailed,
        _ => CryptoError::InvalidCiphertextLength(data.len()),
    })
}
