//! Pull-based encrypt/decrypt streams
//!
//! Both readers do all their work inside `read`: no background thread, no
//! shared state. Each call processes at most one segment, so memory use is
//! bounded by `SEGMENT_SIZE + SEGMENT_OVERHEAD` regardless of input size.
//!
//! The last segment is found by probing one byte past a full segment. An
//! input that ends exactly on a segment boundary therefore marks that full
//! segment as last instead of emitting a trailing empty one.
//!
//! Any error is terminal: the stream is poisoned and every later read
//! returns [`SchemeError::StreamPoisoned`]. Errors raised by this crate are
//! carried inside `io::Error` and can be recovered with
//! [`SchemeError::from_io`]; errors from the wrapped reader pass through
//! untouched.

use std::io::{self, BufRead, BufReader, Read};

use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::algorithms::{Cipher, KeyAlgorithm};
use crate::error::{SchemeError, SchemeResult};
use crate::filekey::FileKey;
use crate::header::read_header;
use crate::manifest::Manifest;
use crate::options::{DecryptOptions, EncryptOptions, UnwrapKeyFn, WrappedKey};
use crate::{SEGMENT_OVERHEAD, SEGMENT_SIZE};

const SEALED_SEGMENT_SIZE: usize = SEGMENT_SIZE + SEGMENT_OVERHEAD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Segments,
    Done,
    Poisoned,
}

// ── Encrypt ─────────────────────────────────────────────────────────────────

/// Wrap `input` in a reader that yields the encrypted document.
///
/// Options are validated, the file key generated and wrapped, and the header
/// signed before this returns; segments are encrypted lazily as the result
/// is read.
pub fn encrypt<R: Read>(input: R, opts: EncryptOptions) -> SchemeResult<EncryptReader<R>> {
    let wrap_key_fn = opts.wrap_key_fn.as_ref().ok_or(SchemeError::WrapKeyFnMissing)?;
    if opts.key_name.is_empty() && !opts.omit_key_name {
        return Err(SchemeError::KeyNameMissing);
    }
    let algorithm = opts
        .algorithm
        .parse::<KeyAlgorithm>()
        .map_err(SchemeError::InvalidAlgorithm)?
        .resolve();
    let cipher = match opts.cipher.as_deref() {
        None | Some("") => Cipher::default(),
        Some(name) => name.parse::<Cipher>().map_err(SchemeError::InvalidCipher)?,
    };

    let key = FileKey::generate(cipher)?;

    let WrappedKey { mut wrapped, tag } = wrap_key_fn(
        &key.secret()[..],
        algorithm.as_str(),
        &opts.key_name,
        None,
    )
    .map_err(SchemeError::WrapKey)?;
    if let Some(tag) = tag {
        wrapped.extend_from_slice(&tag);
    }

    let mut manifest = Manifest {
        key_name: opts.manifest_key_name(),
        key_wrapping_algorithm: algorithm,
        wfk: wrapped,
        cipher,
        nonce_prefix: key.nonce_prefix().to_vec(),
    };
    manifest.validate().map_err(SchemeError::InvalidManifest)?;
    let json = manifest.to_json().map_err(SchemeError::InvalidManifest)?;
    let header = key.sign_header(&json)?;

    debug!(
        key_name = manifest.key_name().unwrap_or(""),
        algorithm = %algorithm,
        cipher = %cipher,
        header_len = header.len(),
        "header signed"
    );

    Ok(EncryptReader {
        inner: input,
        key,
        buf: header,
        pos: 0,
        segment: 0,
        lookahead: None,
        state: State::Segments,
    })
}

/// Reader over an encrypted document; see [`encrypt`].
pub struct EncryptReader<R> {
    inner: R,
    key: FileKey,
    buf: Vec<u8>,
    pos: usize,
    segment: u32,
    lookahead: Option<u8>,
    state: State,
}

impl<R: Read> EncryptReader<R> {
    pub fn cipher(&self) -> Cipher {
        self.key.cipher()
    }

    /// Read and seal the next segment into `buf`.
    fn next_segment(&mut self) -> SchemeResult<()> {
        self.buf.zeroize();
        self.buf.resize(SEGMENT_SIZE, 0);
        self.pos = 0;

        let mut filled = 0;
        if let Some(byte) = self.lookahead.take() {
            self.buf[0] = byte;
            filled = 1;
        }
        filled += read_full(&mut self.inner, &mut self.buf[filled..])?;
        self.buf.truncate(filled);

        let last = filled < SEGMENT_SIZE || {
            let mut probe = [0u8; 1];
            match read_full(&mut self.inner, &mut probe)? {
                0 => true,
                _ => {
                    self.lookahead = Some(probe[0]);
                    false
                }
            }
        };

        let next = if last {
            self.segment
        } else {
            self.segment
                .checked_add(1)
                .ok_or(SchemeError::SegmentCounterExhausted)?
        };

        self.key.encrypt_segment(&mut self.buf, self.segment, last)?;

        if last {
            debug!(segments = u64::from(self.segment) + 1, "encryption complete");
            self.state = State::Done;
        }
        self.segment = next;
        Ok(())
    }
}

impl<R: Read> Read for EncryptReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            if self.pos < self.buf.len() {
                return Ok(drain(&self.buf, &mut self.pos, out));
            }
            match self.state {
                State::Done => return Ok(0),
                State::Poisoned => return Err(SchemeError::StreamPoisoned.into()),
                State::Header | State::Segments => {}
            }
            if let Err(e) = self.next_segment() {
                self.state = State::Poisoned;
                self.buf.zeroize();
                self.buf.clear();
                return Err(e.into());
            }
        }
    }
}

impl<R> std::fmt::Debug for EncryptReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptReader")
            .field("cipher", &self.key.cipher())
            .field("segment", &self.segment)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ── Decrypt ─────────────────────────────────────────────────────────────────

/// Wrap `input` in a reader that yields the decrypted plaintext.
///
/// Only the options are checked here; the header is read, authenticated,
/// and the file key unwrapped on the first `read`.
pub fn decrypt<R: Read>(input: R, mut opts: DecryptOptions) -> SchemeResult<DecryptReader<R>> {
    let unwrap_key_fn = opts
        .unwrap_key_fn
        .take()
        .ok_or(SchemeError::UnwrapKeyFnMissing)?;

    Ok(DecryptReader {
        inner: BufReader::with_capacity(SEALED_SEGMENT_SIZE, input),
        unwrap_key_fn,
        opts,
        key: None,
        manifest: None,
        buf: Zeroizing::new(Vec::new()),
        pos: 0,
        segment: 0,
        state: State::Header,
    })
}

/// Reader over decrypted plaintext; see [`decrypt`].
///
/// Bytes returned before an error are not trustworthy as a whole document:
/// callers must discard partial output when any read fails.
pub struct DecryptReader<R> {
    inner: BufReader<R>,
    unwrap_key_fn: UnwrapKeyFn,
    opts: DecryptOptions,
    key: Option<FileKey>,
    manifest: Option<Manifest>,
    buf: Zeroizing<Vec<u8>>,
    pos: usize,
    segment: u32,
    state: State,
}

impl<R: Read> DecryptReader<R> {
    /// The authenticated manifest, once the header has been read.
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    fn open_header(&mut self) -> SchemeResult<()> {
        let header = read_header(&mut self.inner)?;
        let manifest = &header.manifest;

        let key_name = self
            .opts
            .resolve_key_name(manifest.key_name())
            .ok_or(SchemeError::DecryptionKeyMissing)?;

        // Unwrap failures, bad key material and MAC mismatch all surface as
        // the same error.
        let mut raw = match (self.unwrap_key_fn)(
            manifest.wfk.as_slice(),
            manifest.key_wrapping_algorithm.as_str(),
            key_name,
            None,
            None,
        ) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "file key unwrap failed");
                warn!("header authentication failed");
                return Err(SchemeError::InvalidSignature);
            }
        };
        let key = FileKey::import(&raw, &manifest.nonce_prefix, manifest.cipher);
        raw.zeroize();

        let key = key.map_err(|_| SchemeError::InvalidSignature);
        let verified = key.and_then(|key| {
            key.verify_header_signature(&header.manifest_json, &header.signature)?;
            Ok(key)
        });
        let key = match verified {
            Ok(key) => key,
            Err(e) => {
                warn!("header authentication failed");
                return Err(e);
            }
        };

        debug!(
            key_name,
            algorithm = %manifest.key_wrapping_algorithm,
            cipher = %manifest.cipher,
            "header verified"
        );
        self.key = Some(key);
        self.manifest = Some(header.manifest);
        self.state = State::Segments;
        Ok(())
    }

    /// Read and open the next segment into `buf`.
    fn next_segment(&mut self) -> SchemeResult<()> {
        let segment = self.segment;
        let key = self.key.as_ref().ok_or(SchemeError::StreamPoisoned)?;

        self.buf.zeroize();
        self.buf.resize(SEALED_SEGMENT_SIZE, 0);
        self.pos = 0;

        let filled = read_full(&mut self.inner, &mut self.buf[..])?;
        self.buf.truncate(filled);

        if filled < SEGMENT_OVERHEAD {
            warn!(segment, "segment too short");
            return Err(SchemeError::DecryptionFailed { segment });
        }

        let last = filled < SEALED_SEGMENT_SIZE || at_eof(&mut self.inner)?;

        if let Err(e) = key.decrypt_segment(&mut self.buf, segment, last) {
            warn!(segment, "segment authentication failed");
            return Err(e);
        }

        if last {
            debug!(segments = u64::from(segment) + 1, "decryption complete");
            self.state = State::Done;
        } else {
            self.segment = segment
                .checked_add(1)
                .ok_or(SchemeError::SegmentCounterExhausted)?;
        }
        Ok(())
    }
}

impl<R: Read> Read for DecryptReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            if self.pos < self.buf.len() {
                return Ok(drain(&self.buf, &mut self.pos, out));
            }
            let step = match self.state {
                State::Done => return Ok(0),
                State::Poisoned => return Err(SchemeError::StreamPoisoned.into()),
                State::Header => self.open_header(),
                State::Segments => self.next_segment(),
            };
            if let Err(e) = step {
                self.state = State::Poisoned;
                self.key = None;
                self.buf.zeroize();
                self.buf.clear();
                return Err(e.into());
            }
        }
    }
}

impl<R> std::fmt::Debug for DecryptReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptReader")
            .field("opts", &self.opts)
            .field("segment", &self.segment)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn drain(buf: &[u8], pos: &mut usize, out: &mut [u8]) -> usize {
    let n = (buf.len() - *pos).min(out.len());
    out[..n].copy_from_slice(&buf[*pos..*pos + n]);
    *pos += n;
    n
}

/// Fill `buf` until it is full or the reader is exhausted.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

fn at_eof<R: BufRead>(reader: &mut R) -> io::Result<bool> {
    loop {
        match reader.fill_buf() {
            Ok(buf) => return Ok(buf.is_empty()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
