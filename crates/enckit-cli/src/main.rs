//! enckit: streaming file encryption (dapr.io/enc/v1)
//!
//! Commands:
//!   encrypt      - encrypt a file or stdin
//!   decrypt      - decrypt a file or stdin
//!   inspect      - print the manifest of an encrypted document
//!   config show  - display current configuration

mod provider;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use enckit_core::config::{expand_tilde, EnckitConfig};
use enckit_scheme::{DecryptOptions, EncryptOptions};

use crate::provider::LocalKeys;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "enckit",
    version,
    about = "Streaming authenticated file encryption",
    long_about = "enckit: encrypt and decrypt files in the dapr.io/enc/v1 format using local key files"
)]
struct Cli {
    /// Path to enckit.toml configuration file
    #[arg(long, short = 'c', env = "ENCKIT_CONFIG", default_value = "~/.config/enckit/config.toml")]
    config: PathBuf,

    /// Log level or filter directive (overrides config)
    #[arg(long, env = "ENCKIT_LOG")]
    log: Option<String>,

    /// Log output format (overrides config)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file (or stdin) into a dapr.io/enc/v1 document
    Encrypt {
        /// Key name; read from <keys.dir>/<name>.key unless --key-file is set
        #[arg(long, short = 'k')]
        key: Option<String>,
        /// Read the key-encryption key from this file instead of the key directory
        #[arg(long)]
        key_file: Option<PathBuf>,
        /// Payload cipher: AES-GCM or CHACHA20-POLY1305 (overrides config)
        #[arg(long)]
        cipher: Option<String>,
        /// Key-wrapping algorithm (overrides config)
        #[arg(long)]
        algorithm: Option<String>,
        /// Do not record the key name in the manifest
        #[arg(long)]
        omit_key_name: bool,
        /// Input file (default: stdin)
        #[arg(long = "in", short = 'i')]
        input: Option<PathBuf>,
        /// Output file (default: stdout)
        #[arg(long = "out", short = 'o')]
        output: Option<PathBuf>,
    },

    /// Decrypt a dapr.io/enc/v1 document
    ///
    /// On failure no output file is left behind.
    Decrypt {
        /// Key name; overrides the name recorded in the manifest
        #[arg(long, short = 'k')]
        key: Option<String>,
        /// Read the key-encryption key from this file instead of the key directory
        #[arg(long)]
        key_file: Option<PathBuf>,
        /// Input file (default: stdin)
        #[arg(long = "in", short = 'i')]
        input: Option<PathBuf>,
        /// Output file (default: stdout)
        #[arg(long = "out", short = 'o')]
        output: Option<PathBuf>,
    },

    /// Show the manifest of an encrypted document without decrypting it
    Inspect {
        /// Input file (default: stdin)
        #[arg(long = "in", short = 'i')]
        input: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Display the effective configuration
    Show,
}

// ── Entry point ────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = expand_tilde(&cli.config);
    let config = EnckitConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = match cli.log_format {
        Some(format) => format,
        None => LogFormat::from_str(&config.log.format, true)
            .map_err(|e| anyhow::anyhow!("invalid log.format in config: {e}"))?,
    };
    init_logging(&level, format);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), config = %config_path.display(), "starting");

    match cli.command {
        Commands::Encrypt {
            key,
            key_file,
            cipher,
            algorithm,
            omit_key_name,
            input,
            output,
        } => {
            // The name recorded in the manifest must match the KEK actually used.
            let key_name = key
                .or_else(|| key_file.as_deref().and_then(file_stem))
                .or_else(|| config.keys.default_key.clone())
                .context("no key name: pass --key or set keys.default_key in the config")?;
            let keys = Arc::new(LocalKeys::new(expand_tilde(&config.keys.dir), key_file));

            let opts = EncryptOptions::new(
                keys.wrap_key_fn(),
                key_name,
                algorithm.unwrap_or_else(|| config.keys.algorithm.clone()),
            )
            .with_cipher(cipher.unwrap_or_else(|| config.scheme.cipher.clone()))
            .with_omit_key_name(omit_key_name || config.scheme.omit_key_name);

            cmd_encrypt(input.as_deref(), output.as_deref(), opts)
        }
        Commands::Decrypt {
            key,
            key_file,
            input,
            output,
        } => {
            let key_name = key.or_else(|| key_file.as_deref().and_then(file_stem));
            let keys = Arc::new(LocalKeys::new(expand_tilde(&config.keys.dir), key_file));

            let opts = DecryptOptions {
                key_name,
                ..DecryptOptions::new(keys.unwrap_key_fn())
            };

            cmd_decrypt(input.as_deref(), output.as_deref(), opts)
        }
        Commands::Inspect { input } => cmd_inspect(input.as_deref()),
        Commands::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(&config, &config_path),
        },
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout may carry document bytes, so logs always go to stderr.
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

// ── Commands ───────────────────────────────────────────────────────────────────

fn cmd_encrypt(input: Option<&Path>, output: Option<&Path>, opts: EncryptOptions) -> Result<()> {
    let reader = open_input(input)?;
    let mut sealed = enckit_scheme::encrypt(reader, opts).context("starting encryption")?;
    let bytes = write_output(output, |out| {
        io::copy(&mut sealed, out).context("encrypting")
    })?;
    tracing::info!(bytes, cipher = %sealed.cipher(), "encrypted");
    Ok(())
}

fn cmd_decrypt(input: Option<&Path>, output: Option<&Path>, opts: DecryptOptions) -> Result<()> {
    let reader = open_input(input)?;
    let mut plain = enckit_scheme::decrypt(reader, opts).context("starting decryption")?;
    let bytes = write_output(output, |out| {
        io::copy(&mut plain, out).context("decrypting")
    })?;
    tracing::info!(bytes, "decrypted");
    Ok(())
}

fn cmd_inspect(input: Option<&Path>) -> Result<()> {
    let mut reader = BufReader::new(open_input(input)?);
    let header = enckit_scheme::read_header(&mut reader).context("reading header")?;
    let manifest = &header.manifest;

    let summary = serde_json::json!({
        "scheme": enckit_scheme::SCHEME_NAME,
        "key_name": manifest.key_name(),
        "key_wrapping_algorithm": manifest.key_wrapping_algorithm.as_str(),
        "cipher": manifest.cipher.as_str(),
        "wrapped_key_bytes": manifest.wfk.len(),
        "signature": STANDARD.encode(&header.signature),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_config_show(config: &EnckitConfig, path: &Path) -> Result<()> {
    println!("# {}", path.display());
    print!("{}", config.to_toml()?);
    Ok(())
}

// ── I/O helpers ────────────────────────────────────────────────────────────────

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>> {
    Ok(match path {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("opening input: {}", path.display()))?,
        ),
        None => Box::new(io::stdin().lock()),
    })
}

/// Run `f` against the output, writing files through a temp path that is
/// renamed into place on success and removed on failure.
fn write_output<F>(path: Option<&Path>, f: F) -> Result<u64>
where
    F: FnOnce(&mut dyn Write) -> Result<u64>,
{
    let Some(path) = path else {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let n = f(&mut out)?;
        out.flush()?;
        return Ok(n);
    };

    if path.exists() {
        bail!("output already exists: {}", path.display());
    }
    let tmp = path.with_extension("enckit-tmp");
    let result = (|| -> Result<u64> {
        let mut file = io::BufWriter::new(
            File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?,
        );
        let n = f(&mut file)?;
        file.into_inner()
            .map_err(|e| e.into_error())?
            .sync_all()?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("renaming into place: {}", path.display()))?;
        Ok(n)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}
