use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid key size: expected {expected} bytes, got {found}")]
    InvalidKeySize { expected: usize, found: usize },

    #[error("invalid nonce length: expected {expected} bytes, got {found}")]
    InvalidNonceLength { expected: usize, found: usize },

    #[error("invalid tag length: expected {expected} bytes, got {found}")]
    InvalidTagLength { expected: usize, found: usize },

    #[error("invalid plaintext length: {0} bytes")]
    InvalidPlaintextLength(usize),

    #[error("invalid ciphertext length: {0} bytes")]
    InvalidCiphertextLength(usize),

    /// PKCS#7 padding check failed after an unauthenticated CBC decrypt.
    #[error("invalid padding")]
    InvalidPadding,

    #[error("message authentication failed")]
    AuthenticationFailed,
}
