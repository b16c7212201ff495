//! Key-wrapping algorithms and payload ciphers
//!
//! Both are serialized in the manifest as small integer IDs rather than
//! names, which keeps the clear-text header compact. Parsing an ID is total:
//! unknown values are a recoverable error, since the header is
//! attacker-influenced input.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlgorithmError {
    #[error("unsupported key wrapping algorithm: {0}")]
    UnsupportedKeyAlgorithm(String),

    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),

    #[error("unknown key wrapping algorithm ID: {0}")]
    UnknownKeyAlgorithmId(i64),

    #[error("unknown cipher ID: {0}")]
    UnknownCipherId(i64),

    #[error("value is empty")]
    Empty,

    #[error("value is not an integer")]
    NotAnInteger,
}

/// Algorithm used by the external key-wrapping callback to protect the file key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Aes256Kw,
    Aes128CbcNoPad,
    Aes192CbcNoPad,
    Aes256CbcNoPad,
    RsaOaep256,
    /// Alias for [`KeyAlgorithm::Aes256Kw`]
    Aes,
    /// Alias for [`KeyAlgorithm::RsaOaep256`]
    Rsa,
}

impl KeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes256Kw => "A256KW",
            Self::Aes128CbcNoPad => "A128CBC-NOPAD",
            Self::Aes192CbcNoPad => "A192CBC-NOPAD",
            Self::Aes256CbcNoPad => "A256CBC-NOPAD",
            Self::RsaOaep256 => "RSA-OAEP-256",
            Self::Aes => "AES",
            Self::Rsa => "RSA",
        }
    }

    /// Replace an alias with the algorithm it stands for.
    pub fn resolve(self) -> Self {
        match self {
            Self::Aes => Self::Aes256Kw,
            Self::Rsa => Self::RsaOaep256,
            other => other,
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, Self::Aes | Self::Rsa)
    }

    /// Wire ID; aliases share the ID of their target.
    pub fn id(&self) -> u8 {
        match self {
            Self::Aes256Kw | Self::Aes => 1,
            Self::Aes128CbcNoPad => 2,
            Self::Aes192CbcNoPad => 3,
            Self::Aes256CbcNoPad => 4,
            Self::RsaOaep256 | Self::Rsa => 5,
        }
    }

    pub fn from_id(id: i64) -> Result<Self, AlgorithmError> {
        match id {
            1 => Ok(Self::Aes256Kw),
            2 => Ok(Self::Aes128CbcNoPad),
            3 => Ok(Self::Aes192CbcNoPad),
            4 => Ok(Self::Aes256CbcNoPad),
            5 => Ok(Self::RsaOaep256),
            other => Err(AlgorithmError::UnknownKeyAlgorithmId(other)),
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = AlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [KeyAlgorithm; 7] = [
            KeyAlgorithm::Aes256Kw,
            KeyAlgorithm::Aes128CbcNoPad,
            KeyAlgorithm::Aes192CbcNoPad,
            KeyAlgorithm::Aes256CbcNoPad,
            KeyAlgorithm::RsaOaep256,
            KeyAlgorithm::Aes,
            KeyAlgorithm::Rsa,
        ];
        if s.is_empty() {
            return Err(AlgorithmError::Empty);
        }
        ALL.iter()
            .copied()
            .find(|alg| alg.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AlgorithmError::UnsupportedKeyAlgorithm(s.to_string()))
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AEAD used for payload segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cipher {
    #[default]
    AesGcm,
    ChaCha20Poly1305,
}

impl Cipher {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AesGcm => "AES-GCM",
            Self::ChaCha20Poly1305 => "CHACHA20-POLY1305",
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            Self::AesGcm => 1,
            Self::ChaCha20Poly1305 => 2,
        }
    }

    pub fn from_id(id: i64) -> Result<Self, AlgorithmError> {
        match id {
            1 => Ok(Self::AesGcm),
            2 => Ok(Self::ChaCha20Poly1305),
            other => Err(AlgorithmError::UnknownCipherId(other)),
        }
    }
}

impl FromStr for Cipher {
    type Err = AlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AlgorithmError::Empty);
        }
        [Self::AesGcm, Self::ChaCha20Poly1305]
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AlgorithmError::UnsupportedCipher(s.to_string()))
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for KeyAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.id())
    }
}

impl<'de> Deserialize<'de> for KeyAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = deserializer.deserialize_any(IdVisitor)?;
        KeyAlgorithm::from_id(id).map_err(de::Error::custom)
    }
}

impl Serialize for Cipher {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.id())
    }
}

impl<'de> Deserialize<'de> for Cipher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = deserializer.deserialize_any(IdVisitor)?;
        Cipher::from_id(id).map_err(de::Error::custom)
    }
}

/// Accepts only integers; null and empty strings are `Empty`, anything else
/// is `NotAnInteger`.
struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integer algorithm ID")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v).map_err(|_| E::custom(AlgorithmError::NotAnInteger))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<i64, E> {
        Err(E::custom(AlgorithmError::NotAnInteger))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
        if v.is_empty() {
            Err(E::custom(AlgorithmError::Empty))
        } else {
            Err(E::custom(AlgorithmError::NotAnInteger))
        }
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<i64, E> {
        Err(E::custom(AlgorithmError::NotAnInteger))
    }

    fn visit_unit<E: de::Error>(self) -> Result<i64, E> {
        Err(E::custom(AlgorithmError::Empty))
    }

    fn visit_none<E: de::Error>(self) -> Result<i64, E> {
        Err(E::custom(AlgorithmError::Empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_resolution() {
        assert_eq!("AES".parse::<KeyAlgorithm>().unwrap().resolve(), KeyAlgorithm::Aes256Kw);
        assert_eq!("rsa".parse::<KeyAlgorithm>().unwrap().resolve(), KeyAlgorithm::RsaOaep256);
        assert_eq!(KeyAlgorithm::Aes.id(), KeyAlgorithm::Aes256Kw.id());
        assert!(KeyAlgorithm::Rsa.is_alias());
        assert!(!KeyAlgorithm::Aes128CbcNoPad.is_alias());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("A256KW".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::Aes256Kw);
        assert_eq!(
            "a192cbc-nopad".parse::<KeyAlgorithm>().unwrap(),
            KeyAlgorithm::Aes192CbcNoPad
        );
        assert_eq!(
            "ChaCha20-Poly1305".parse::<Cipher>().unwrap(),
            Cipher::ChaCha20Poly1305
        );
        assert_eq!(
            "A128GCM".parse::<KeyAlgorithm>(),
            Err(AlgorithmError::UnsupportedKeyAlgorithm("A128GCM".into()))
        );
        assert_eq!("".parse::<Cipher>(), Err(AlgorithmError::Empty));
    }

    #[test]
    fn test_id_roundtrip() {
        for id in 1..=5 {
            assert_eq!(KeyAlgorithm::from_id(id).unwrap().id() as i64, id);
        }
        for id in 1..=2 {
            assert_eq!(Cipher::from_id(id).unwrap().id() as i64, id);
        }
        assert_eq!(KeyAlgorithm::from_id(0), Err(AlgorithmError::UnknownKeyAlgorithmId(0)));
        assert_eq!(Cipher::from_id(3), Err(AlgorithmError::UnknownCipherId(3)));
    }

    #[test]
    fn test_json_is_integer() {
        assert_eq!(serde_json::to_string(&KeyAlgorithm::RsaOaep256).unwrap(), "5");
        assert_eq!(serde_json::to_string(&KeyAlgorithm::Aes).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Cipher::ChaCha20Poly1305).unwrap(), "2");
        assert_eq!(serde_json::from_str::<Cipher>("1").unwrap(), Cipher::AesGcm);
        assert_eq!(
            serde_json::from_str::<KeyAlgorithm>("4").unwrap(),
            KeyAlgorithm::Aes256CbcNoPad
        );
    }

    #[test]
    fn test_json_rejects_non_integers() {
        let err = serde_json::from_str::<Cipher>("null").unwrap_err();
        assert!(err.to_string().contains("value is empty"), "{err}");

        let err = serde_json::from_str::<Cipher>("\"\"").unwrap_err();
        assert!(err.to_string().contains("value is empty"), "{err}");

        let err = serde_json::from_str::<KeyAlgorithm>("\"A256KW\"").unwrap_err();
        assert!(err.to_string().contains("not an integer"), "{err}");

        let err = serde_json::from_str::<KeyAlgorithm>("1.5").unwrap_err();
        assert!(err.to_string().contains("not an integer"), "{err}");

        let err = serde_json::from_str::<KeyAlgorithm>("9").unwrap_err();
        assert!(err.to_string().contains("unknown key wrapping algorithm ID: 9"), "{err}");

        let err = serde_json::from_str::<Cipher>("-1").unwrap_err();
        assert!(err.to_string().contains("unknown cipher ID: -1"), "{err}");
    }
}
