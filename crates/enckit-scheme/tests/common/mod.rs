//! Shared fixtures: an in-memory AES-KW key store standing in for a KMS.

#![allow(dead_code)]

use std::io::Read;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use enckit_scheme::{
    DecryptOptions, EncryptOptions, SchemeError, UnwrapKeyFn, WrapKeyFn, WrappedKey,
};

pub const MYKEY: [u8; 32] = [0x11; 32];
pub const OTHER: [u8; 32] = [0x22; 32];

fn kek(name: &str) -> anyhow::Result<&'static [u8; 32]> {
    match name {
        "mykey" => Ok(&MYKEY),
        "other" => Ok(&OTHER),
        _ => bail!("unknown key {name:?}"),
    }
}

pub fn wrap_fn() -> WrapKeyFn {
    Arc::new(
        |key: &[u8], algorithm: &str, key_name: &str, nonce: Option<&[u8]>| -> anyhow::Result<WrappedKey> {
            let (wrapped, tag) =
                enckit_crypto::encrypt_symmetric(key, algorithm, kek(key_name)?, nonce, None)?;
            Ok(WrappedKey { wrapped, tag })
        },
    )
}

pub fn unwrap_fn() -> UnwrapKeyFn {
    Arc::new(
        |wfk: &[u8],
         algorithm: &str,
         key_name: &str,
         nonce: Option<&[u8]>,
         tag: Option<&[u8]>|
         -> anyhow::Result<Vec<u8>> {
            enckit_crypto::decrypt_symmetric(wfk, algorithm, kek(key_name)?, nonce, tag, None)
                .map_err(|e| anyhow!("unwrap with {key_name:?}: {e}"))
        },
    )
}

pub fn encrypt_opts() -> EncryptOptions {
    EncryptOptions::new(wrap_fn(), "mykey", "A256KW")
}

pub fn decrypt_opts() -> DecryptOptions {
    DecryptOptions::new(unwrap_fn())
}

pub fn seal(plaintext: &[u8], opts: EncryptOptions) -> Vec<u8> {
    let mut out = Vec::new();
    enckit_scheme::encrypt(plaintext, opts)
        .expect("encrypt")
        .read_to_end(&mut out)
        .expect("read ciphertext");
    out
}

pub fn open(sealed: &[u8], opts: DecryptOptions) -> Result<Vec<u8>, std::io::Error> {
    let mut out = Vec::new();
    enckit_scheme::decrypt(sealed, opts)
        .expect("decrypt options")
        .read_to_end(&mut out)?;
    Ok(out)
}

/// Decrypt, expecting failure, and return the error it carried.
pub fn open_err(sealed: &[u8], opts: DecryptOptions) -> std::io::Error {
    open(sealed, opts).expect_err("decryption must fail")
}

pub fn scheme_err(err: &std::io::Error) -> &SchemeError {
    SchemeError::from_io(err).unwrap_or_else(|| panic!("not a scheme error: {err}"))
}

/// Offset of the first segment byte.
pub fn header_len(sealed: &[u8]) -> usize {
    sealed
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .nth(2)
        .map(|(i, _)| i + 1)
        .expect("three header lines")
}

pub fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}
