//! Local key-file provider for the wrap/unwrap callbacks
//!
//! Key-encryption keys are raw AES keys (16, 24 or 32 bytes), stored
//! base64-encoded in `<keys.dir>/<name>.key` or passed explicitly with
//! `--key-file`. Supported wrapping algorithms:
//!
//! - `A256KW`: RFC 3394 key wrap, 32-byte KEK.
//! - `A128CBC-NOPAD` / `A192CBC-NOPAD` / `A256CBC-NOPAD`: a random 16-byte IV
//!   is generated per wrap and stored in front of the ciphertext. This mode
//!   has no integrity of its own; a wrong KEK yields a garbage file key that
//!   the header signature check then rejects.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use enckit_core::{EnckitError, EnckitResult};
use enckit_crypto::SymmetricAlgorithm;
use enckit_scheme::{KeyAlgorithm, UnwrapKeyFn, WrapKeyFn, WrappedKey};
use rand::RngCore;
use zeroize::Zeroizing;

const IV_SIZE: usize = 16;
const MAX_KEY_NAME_LEN: usize = 128;

pub struct LocalKeys {
    dir: PathBuf,
    key_file: Option<PathBuf>,
}

impl LocalKeys {
    pub fn new(dir: PathBuf, key_file: Option<PathBuf>) -> Self {
        Self { dir, key_file }
    }

    /// Where the KEK for `name` is read from.
    pub fn key_path(&self, name: &str) -> EnckitResult<PathBuf> {
        if let Some(path) = &self.key_file {
            return Ok(path.clone());
        }
        validate_key_name(name)?;
        Ok(self.dir.join(format!("{name}.key")))
    }

    pub fn load_kek(&self, name: &str) -> EnckitResult<Zeroizing<Vec<u8>>> {
        let path = self.key_path(name)?;
        read_key_file(&path)
    }

    pub fn wrap(&self, key: &[u8], algorithm: &str, key_name: &str) -> anyhow::Result<WrappedKey> {
        let kek = self.load_kek(key_name)?;
        let algorithm = algorithm.parse::<KeyAlgorithm>()?.resolve();

        match cbc_or_kw(algorithm)? {
            alg @ SymmetricAlgorithm::A256Kw => {
                let (wrapped, _) = enckit_crypto::encrypt(key, alg, &kek, None, None)?;
                Ok(wrapped.into())
            }
            alg => {
                let mut iv = [0u8; IV_SIZE];
                rand::thread_rng().fill_bytes(&mut iv);
                let (ciphertext, _) = enckit_crypto::encrypt(key, alg, &kek, Some(&iv[..]), None)?;

                let mut wrapped = Vec::with_capacity(IV_SIZE + ciphertext.len());
                wrapped.extend_from_slice(&iv);
                wrapped.extend_from_slice(&ciphertext);
                Ok(wrapped.into())
            }
        }
    }

    pub fn unwrap(&self, wrapped: &[u8], algorithm: &str, key_name: &str) -> anyhow::Result<Vec<u8>> {
        let kek = self.load_kek(key_name)?;
        let algorithm = algorithm.parse::<KeyAlgorithm>()?.resolve();

        let key = match cbc_or_kw(algorithm)? {
            alg @ SymmetricAlgorithm::A256Kw => {
                enckit_crypto::decrypt(wrapped, alg, &kek, None, None, None)?
            }
            alg => {
                if wrapped.len() <= IV_SIZE {
                    bail!("wrapped key too short: {} bytes", wrapped.len());
                }
                let (iv, ciphertext) = wrapped.split_at(IV_SIZE);
                enckit_crypto::decrypt(ciphertext, alg, &kek, Some(iv), None, None)?
            }
        };
        Ok(key)
    }

    pub fn wrap_key_fn(self: &Arc<Self>) -> WrapKeyFn {
        let keys = Arc::clone(self);
        Arc::new(
            move |key: &[u8], algorithm: &str, key_name: &str, _nonce: Option<&[u8]>| {
                keys.wrap(key, algorithm, key_name)
            },
        )
    }

    pub fn unwrap_key_fn(self: &Arc<Self>) -> UnwrapKeyFn {
        let keys = Arc::clone(self);
        Arc::new(
            move |wrapped: &[u8],
                  algorithm: &str,
                  key_name: &str,
                  _nonce: Option<&[u8]>,
                  _tag: Option<&[u8]>| { keys.unwrap(wrapped, algorithm, key_name) },
        )
    }
}

fn cbc_or_kw(algorithm: KeyAlgorithm) -> anyhow::Result<SymmetricAlgorithm> {
    Ok(match algorithm {
        KeyAlgorithm::Aes256Kw => SymmetricAlgorithm::A256Kw,
        KeyAlgorithm::Aes128CbcNoPad => SymmetricAlgorithm::A128CbcNoPad,
        KeyAlgorithm::Aes192CbcNoPad => SymmetricAlgorithm::A192CbcNoPad,
        KeyAlgorithm::Aes256CbcNoPad => SymmetricAlgorithm::A256CbcNoPad,
        other => bail!("key algorithm {other} is not supported by local key files"),
    })
}

/// Key names become file names, so only a conservative character set is allowed.
pub fn validate_key_name(name: &str) -> EnckitResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_KEY_NAME_LEN
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if valid {
        Ok(())
    } else {
        Err(EnckitError::Key(format!("invalid key name: {name:?}")))
    }
}

pub fn read_key_file(path: &Path) -> EnckitResult<Zeroizing<Vec<u8>>> {
    let encoded = Zeroizing::new(
        std::fs::read_to_string(path)
            .with_context(|| format!("reading key file: {}", path.display()))?,
    );
    let kek = Zeroizing::new(
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| EnckitError::Key(format!("{}: not base64: {e}", path.display())))?,
    );
    if !matches!(kek.len(), 16 | 24 | 32) {
        return Err(EnckitError::Key(format!(
            "{}: key must be 16, 24 or 32 bytes, got {}",
            path.display(),
            kek.len()
        )));
    }
    Ok(kek)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_with(name: &str, kek: &[u8]) -> (tempfile::TempDir, LocalKeys) {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(format!("{name}.key")), STANDARD.encode(kek)).unwrap();
        let keys = LocalKeys::new(tmp.path().to_path_buf(), None);
        (tmp, keys)
    }

    #[test]
    fn test_a256kw_roundtrip() {
        let (_tmp, keys) = keys_with("ops", &[7u8; 32]);
        let file_key = [0x42u8; 32];
        let wrapped = keys.wrap(&file_key, "A256KW", "ops").unwrap();
        assert_eq!(wrapped.wrapped.len(), 40);
        assert!(wrapped.tag.is_none());
        assert_eq!(keys.unwrap(&wrapped.wrapped, "A256KW", "ops").unwrap(), file_key);
    }

    #[test]
    fn test_cbc_nopad_uses_fresh_iv() {
        let (_tmp, keys) = keys_with("ops", &[7u8; 16]);
        let file_key = [0x42u8; 32];
        let a = keys.wrap(&file_key, "A128CBC-NOPAD", "ops").unwrap();
        let b = keys.wrap(&file_key, "A128CBC-NOPAD", "ops").unwrap();
        assert_eq!(a.wrapped.len(), IV_SIZE + 32);
        assert_ne!(a.wrapped, b.wrapped);
        assert_eq!(keys.unwrap(&a.wrapped, "A128CBC-NOPAD", "ops").unwrap(), file_key);
    }

    #[test]
    fn test_alias_and_unsupported() {
        let (_tmp, keys) = keys_with("ops", &[7u8; 32]);
        assert!(keys.wrap(&[0u8; 32], "aes", "ops").is_ok());

        let err = keys.wrap(&[0u8; 32], "RSA-OAEP-256", "ops").unwrap_err();
        assert!(err.to_string().contains("not supported"), "{err}");
    }

    #[test]
    fn test_wrong_kek_size_for_algorithm() {
        let (_tmp, keys) = keys_with("ops", &[7u8; 16]);
        assert!(keys.wrap(&[0u8; 32], "A256KW", "ops").is_err());
    }

    #[test]
    fn test_missing_key_file() {
        let (_tmp, keys) = keys_with("ops", &[7u8; 32]);
        let err = keys.wrap(&[0u8; 32], "A256KW", "absent").unwrap_err();
        assert!(err.to_string().contains("absent.key"), "{err}");
    }

    #[test]
    fn test_key_file_override_ignores_name() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("explicit.b64");
        std::fs::write(&path, format!("{}\n", STANDARD.encode([9u8; 32]))).unwrap();

        let keys = LocalKeys::new(PathBuf::from("/nonexistent"), Some(path.clone()));
        assert_eq!(keys.key_path("any/name").unwrap(), path);
        assert_eq!(*keys.load_kek("whatever").unwrap(), vec![9u8; 32]);
    }

    #[test]
    fn test_validate_key_name() {
        for ok in ["mykey", "team.prod-1", "K_2"] {
            assert!(validate_key_name(ok).is_ok(), "{ok}");
        }
        let long = "x".repeat(MAX_KEY_NAME_LEN + 1);
        for bad in ["", ".hidden", "../escape", "a/b", "sp ace", long.as_str()] {
            assert!(validate_key_name(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_read_key_file_rejects_bad_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("k.key");

        std::fs::write(&path, "not base64!").unwrap();
        assert!(matches!(read_key_file(&path), Err(EnckitError::Key(_))));

        std::fs::write(&path, STANDARD.encode([1u8; 20])).unwrap();
        assert!(matches!(read_key_file(&path), Err(EnckitError::Key(_))));
    }
}
