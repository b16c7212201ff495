//! Clear-text header parsing
//!
//! The header is three newline-terminated lines: scheme name, manifest JSON,
//! base64 signature. Everything here runs before any cryptographic check, so
//! the whole header is read under a fixed byte budget.

use std::io::{BufRead, Read};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{SchemeError, SchemeResult};
use crate::manifest::Manifest;
use crate::{SCHEME_NAME, SEGMENT_SIZE};

/// A parsed, validated, but not yet authenticated header.
#[derive(Debug, Clone)]
pub struct Header {
    pub manifest: Manifest,
    /// Manifest line exactly as read; the signature covers these bytes.
    pub manifest_json: Vec<u8>,
    /// Decoded HMAC from the signature line.
    pub signature: Vec<u8>,
}

/// Read and validate the header, leaving `reader` positioned at segment 0.
///
/// The signature is decoded but not verified; that needs the file key.
pub fn read_header<R: BufRead>(reader: &mut R) -> SchemeResult<Header> {
    let mut budget = SEGMENT_SIZE;

    let mut scheme = Vec::with_capacity(SCHEME_NAME.len() + 1);
    reader
        .by_ref()
        .take((SCHEME_NAME.len() + 1) as u64)
        .read_until(b'\n', &mut scheme)?;
    if scheme.strip_suffix(b"\n") != Some(SCHEME_NAME.as_bytes()) {
        return Err(SchemeError::UnsupportedScheme);
    }
    budget -= scheme.len();

    let mut manifest_json = Vec::new();
    if !read_line(reader, &mut budget, &mut manifest_json)? || manifest_json.is_empty() {
        return Err(SchemeError::ManifestNotFound);
    }
    let mut manifest =
        Manifest::from_json(&manifest_json).map_err(SchemeError::InvalidManifest)?;
    manifest.validate().map_err(SchemeError::InvalidManifest)?;

    let mut signature_line = Vec::new();
    if !read_line(reader, &mut budget, &mut signature_line)? || signature_line.is_empty() {
        return Err(SchemeError::SignatureNotFound);
    }
    let signature = STANDARD
        .decode(&signature_line)
        .map_err(|_| SchemeError::InvalidSignatureFormat)?;

    Ok(Header {
        manifest,
        manifest_json,
        signature,
    })
}

/// Read one line into `line` without its terminator. Returns `false` if the
/// input ended before a newline.
fn read_line<R: BufRead>(reader: &mut R, budget: &mut usize, line: &mut Vec<u8>) -> SchemeResult<bool> {
    let n = reader.by_ref().take(*budget as u64).read_until(b'\n', line)?;
    *budget -= n;

    if line.last() == Some(&b'\n') {
        line.pop();
        return Ok(true);
    }
    if *budget == 0 {
        return Err(SchemeError::HeaderTooLarge { max: SEGMENT_SIZE });
    }
    Ok(false)
}
