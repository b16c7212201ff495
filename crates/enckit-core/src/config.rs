use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EnckitError, EnckitResult};

/// Top-level configuration (loaded from enckit.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnckitConfig {
    pub log: LogConfig,
    pub keys: KeysConfig,
    pub scheme: SchemeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level or EnvFilter directive (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Local key-encryption keys
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Directory holding `<name>.key` files (default: ~/.config/enckit/keys)
    pub dir: PathBuf,
    /// Key name used when none is given on the command line
    pub default_key: Option<String>,
    /// Key-wrapping algorithm (default: A256KW)
    pub algorithm: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemeConfig {
    /// Payload cipher: "AES-GCM" or "CHACHA20-POLY1305"
    pub cipher: String,
    /// Leave the key name out of the manifest
    pub omit_key_name: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("~/.config/enckit/keys"),
            default_key: None,
            algorithm: "A256KW".into(),
        }
    }
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self {
            cipher: "AES-GCM".into(),
            omit_key_name: false,
        }
    }
}

impl EnckitConfig {
    /// Load from `path`, falling back to defaults if the file does not exist.
    pub fn load(path: &Path) -> EnckitResult<Self> {
        if !path.exists() {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| EnckitError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn to_toml(&self) -> EnckitResult<String> {
        toml::to_string_pretty(self).map_err(|e| EnckitError::Config(e.to_string()))
    }
}

/// Expand a leading `~/` to `$HOME`.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[log]
level = "debug"
format = "json"

[keys]
dir = "/etc/enckit/keys"
default_key = "mykey"
algorithm = "A256CBC-NOPAD"

[scheme]
cipher = "CHACHA20-POLY1305"
omit_key_name = true
"#;
        let config: EnckitConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
        assert_eq!(config.keys.dir, PathBuf::from("/etc/enckit/keys"));
        assert_eq!(config.keys.default_key.as_deref(), Some("mykey"));
        assert_eq!(config.keys.algorithm, "A256CBC-NOPAD");
        assert_eq!(config.scheme.cipher, "CHACHA20-POLY1305");
        assert!(config.scheme.omit_key_name);
    }

    #[test]
    fn test_parse_defaults() {
        let config: EnckitConfig = toml::from_str("").unwrap();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "text");
        assert_eq!(config.keys.dir, PathBuf::from("~/.config/enckit/keys"));
        assert!(config.keys.default_key.is_none());
        assert_eq!(config.keys.algorithm, "A256KW");
        assert_eq!(config.scheme.cipher, "AES-GCM");
        assert!(!config.scheme.omit_key_name);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[keys]
default_key = "ops"
"#;
        let config: EnckitConfig = toml::from_str(toml_str).unwrap();
        // Overridden
        assert_eq!(config.keys.default_key.as_deref(), Some("ops"));
        // Defaults
        assert_eq!(config.keys.algorithm, "A256KW");
        assert_eq!(config.scheme.cipher, "AES-GCM");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = EnckitConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed: EnckitConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.keys.dir, parsed.keys.dir);
        assert_eq!(config.scheme.cipher, parsed.scheme.cipher);
        assert_eq!(config.log.format, parsed.log.format);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = EnckitConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.keys.algorithm, "A256KW");
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("enckit.toml");
        std::fs::write(&path, "[scheme\ncipher = 1").unwrap();
        let err = EnckitConfig::load(&path).unwrap_err();
        assert!(matches!(err, EnckitError::Config(_)));
    }

    #[test]
    fn test_expand_tilde() {
        let home = std::env::var("HOME").unwrap_or_default();
        assert_eq!(
            expand_tilde(Path::new("~/keys")),
            PathBuf::from(home).join("keys")
        );
        assert_eq!(expand_tilde(Path::new("/abs/keys")), PathBuf::from("/abs/keys"));
    }
}
