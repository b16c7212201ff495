use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;

/// A temp workspace with a config file pointing at its own key directory.
struct Env {
    dir: tempfile::TempDir,
}

impl Env {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::create_dir(dir.path().join("keys")).expect("create keys dir");
        let config = format!(
            "[log]\nlevel = \"warn\"\n\n[keys]\ndir = \"{}\"\n",
            dir.path().join("keys").display()
        );
        fs::write(dir.path().join("enckit.toml"), config).expect("write config");
        let env = Self { dir };
        env.add_key("mykey", &[0x11; 32]);
        env
    }

    /// Append `extra` to the `[keys]` section of the config.
    fn set_keys_config(&self, extra: &str) {
        let config = format!(
            "[log]\nlevel = \"warn\"\n\n[keys]\ndir = \"{}\"\n{extra}\n",
            self.path("keys").display()
        );
        fs::write(self.path("enckit.toml"), config).expect("write config");
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn add_key(&self, name: &str, kek: &[u8]) -> PathBuf {
        let path = self.path("keys").join(format!("{name}.key"));
        fs::write(&path, format!("{}\n", STANDARD.encode(kek))).expect("write key");
        path
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_enckit"));
        cmd.env("ENCKIT_CONFIG", self.path("enckit.toml"));
        cmd.env_remove("ENCKIT_LOG");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("run enckit")
    }

    fn run_with_stdin(&self, args: &[&str], stdin: &[u8]) -> Output {
        let mut child = self
            .command()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn enckit");
        child
            .stdin
            .take()
            .expect("stdin")
            .write_all(stdin)
            .expect("write stdin");
        child.wait_with_output().expect("wait enckit")
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

fn assert_exit(output: &Output, expected: i32) {
    assert_eq!(
        output.status.code(),
        Some(expected),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn assert_no_temp(output: &Path) {
    let tmp_path = output.with_extension("enckit-tmp");
    assert!(
        !tmp_path.exists(),
        "unexpected temp file: {}",
        tmp_path.display()
    );
}

fn encrypt_file(env: &Env, data: &[u8], extra: &[&str]) -> PathBuf {
    let input = env.path("plain.bin");
    let sealed = env.path("sealed.enc");
    fs::write(&input, data).expect("write input");

    let mut args = vec!["encrypt", "--in", path_str(&input), "--out", path_str(&sealed)];
    args.extend_from_slice(extra);
    assert_exit(&env.run(&args), EXIT_SUCCESS);
    sealed
}

#[test]
fn encrypt_decrypt_file_roundtrip() {
    let env = Env::new();
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let sealed = encrypt_file(&env, &data, &["--key", "mykey"]);

    let contents = fs::read(&sealed).expect("read sealed");
    assert!(contents.starts_with(b"dapr.io/enc/v1\n"));
    assert_ne!(&contents[contents.len() - 100..], &data[data.len() - 100..]);

    let output = env.path("plain.out");
    let dec = env.run(&["decrypt", "--in", path_str(&sealed), "--out", path_str(&output)]);
    assert_exit(&dec, EXIT_SUCCESS);
    assert_eq!(fs::read(&output).expect("read output"), data);
    assert_no_temp(&output);
}

#[test]
fn chacha_cipher_and_inspect() {
    let env = Env::new();
    let sealed = encrypt_file(&env, b"inspect me", &["--key", "mykey", "--cipher", "chacha20-poly1305"]);

    let out = env.run(&["inspect", "--in", path_str(&sealed)]);
    assert_exit(&out, EXIT_SUCCESS);
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json summary");
    assert_eq!(summary["key_name"], "mykey");
    assert_eq!(summary["key_wrapping_algorithm"], "A256KW");
    assert_eq!(summary["cipher"], "CHACHA20-POLY1305");
    assert_eq!(summary["wrapped_key_bytes"], 40);
}

#[test]
fn stdin_to_stdout_pipeline() {
    let env = Env::new();
    let enc = env.run_with_stdin(&["encrypt", "--key", "mykey"], b"piped through");
    assert_exit(&enc, EXIT_SUCCESS);
    assert!(enc.stdout.starts_with(b"dapr.io/enc/v1\n"));

    let dec = env.run_with_stdin(&["decrypt"], &enc.stdout);
    assert_exit(&dec, EXIT_SUCCESS);
    assert_eq!(dec.stdout, b"piped through");
}

#[test]
fn wrong_key_fails_without_output() {
    let env = Env::new();
    env.add_key("other", &[0x22; 32]);
    let sealed = encrypt_file(&env, b"secret", &["--key", "mykey"]);

    let output = env.path("plain.out");
    let dec = env.run(&[
        "decrypt",
        "--key",
        "other",
        "--in",
        path_str(&sealed),
        "--out",
        path_str(&output),
    ]);
    assert_exit(&dec, EXIT_FAILURE);
    assert!(String::from_utf8_lossy(&dec.stderr).contains("signature"));
    assert!(!output.exists());
    assert_no_temp(&output);
}

#[test]
fn tampered_document_fails_without_output() {
    let env = Env::new();
    let sealed = encrypt_file(&env, b"do not touch", &["--key", "mykey"]);
    let mut contents = fs::read(&sealed).expect("read sealed");
    let last = contents.len() - 1;
    contents[last] ^= 0x01;
    fs::write(&sealed, &contents).expect("write tampered");

    let output = env.path("plain.out");
    let dec = env.run(&["decrypt", "--in", path_str(&sealed), "--out", path_str(&output)]);
    assert_exit(&dec, EXIT_FAILURE);
    assert!(!output.exists());
    assert_no_temp(&output);
}

#[test]
fn omitted_key_name_requires_key_on_decrypt() {
    let env = Env::new();
    let sealed = encrypt_file(&env, b"anonymous", &["--key", "mykey", "--omit-key-name"]);

    let out = env.run(&["inspect", "--in", path_str(&sealed)]);
    assert_exit(&out, EXIT_SUCCESS);
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json summary");
    assert!(summary["key_name"].is_null());

    let output = env.path("plain.out");
    let dec = env.run(&["decrypt", "--in", path_str(&sealed), "--out", path_str(&output)]);
    assert_exit(&dec, EXIT_FAILURE);
    assert!(!output.exists());

    let dec = env.run(&[
        "decrypt",
        "--key",
        "mykey",
        "--in",
        path_str(&sealed),
        "--out",
        path_str(&output),
    ]);
    assert_exit(&dec, EXIT_SUCCESS);
    assert_eq!(fs::read(&output).expect("read output"), b"anonymous");
}

#[test]
fn explicit_key_file_names_the_key() {
    let env = Env::new();
    let key_file = env.path("ops.b64");
    fs::write(&key_file, STANDARD.encode([0x33u8; 32])).expect("write key file");

    let sealed = encrypt_file(&env, b"from key file", &["--key-file", path_str(&key_file)]);

    let out = env.run(&["inspect", "--in", path_str(&sealed)]);
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json summary");
    assert_eq!(summary["key_name"], "ops");

    let dec = env.run(&["decrypt", "--key-file", path_str(&key_file), "--in", path_str(&sealed)]);
    assert_exit(&dec, EXIT_SUCCESS);
    assert_eq!(dec.stdout, b"from key file");
}

#[test]
fn key_file_stem_wins_over_default_key() {
    let env = Env::new();
    env.set_keys_config("default_key = \"mykey\"");
    let key_file = env.path("foo.key");
    fs::write(&key_file, STANDARD.encode([0x55u8; 32])).expect("write key file");

    let sealed = encrypt_file(&env, b"labelled", &["--key-file", path_str(&key_file)]);

    let out = env.run(&["inspect", "--in", path_str(&sealed)]);
    assert_exit(&out, EXIT_SUCCESS);
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json summary");
    assert_eq!(summary["key_name"], "foo");

    // The recorded name alone finds the right KEK in the key directory.
    fs::copy(&key_file, env.path("keys").join("foo.key")).expect("copy key");
    let dec = env.run(&["decrypt", "--in", path_str(&sealed)]);
    assert_exit(&dec, EXIT_SUCCESS);
    assert_eq!(dec.stdout, b"labelled");
}

#[test]
fn default_key_used_without_key_or_key_file() {
    let env = Env::new();
    env.set_keys_config("default_key = \"mykey\"");
    let sealed = encrypt_file(&env, b"defaulted", &[]);

    let out = env.run(&["inspect", "--in", path_str(&sealed)]);
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json summary");
    assert_eq!(summary["key_name"], "mykey");
}

#[test]
fn cbc_wrapping_roundtrip() {
    let env = Env::new();
    env.add_key("legacy", &[0x44; 16]);
    let sealed = encrypt_file(&env, b"cbc wrapped", &["--key", "legacy", "--algorithm", "A128CBC-NOPAD"]);

    let dec = env.run(&["decrypt", "--in", path_str(&sealed)]);
    assert_exit(&dec, EXIT_SUCCESS);
    assert_eq!(dec.stdout, b"cbc wrapped");
}

#[test]
fn encrypt_refuses_existing_output() {
    let env = Env::new();
    let input = env.path("plain.bin");
    let output = env.path("sealed.enc");
    fs::write(&input, b"new").expect("write input");
    fs::write(&output, b"existing").expect("write output");

    let out = env.run(&[
        "encrypt",
        "--key",
        "mykey",
        "--in",
        path_str(&input),
        "--out",
        path_str(&output),
    ]);
    assert_exit(&out, EXIT_FAILURE);
    assert_eq!(fs::read(&output).expect("read output"), b"existing");
}

#[test]
fn encrypt_without_key_name_fails() {
    let env = Env::new();
    let out = env.run(&["encrypt"]);
    assert_exit(&out, EXIT_FAILURE);
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("no key name"));
}

#[test]
fn config_show_prints_effective_config() {
    let env = Env::new();
    let out = env.run(&["config", "show"]);
    assert_exit(&out, EXIT_SUCCESS);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("cipher = \"AES-GCM\""), "{stdout}");
    assert!(stdout.contains("level = \"warn\""), "{stdout}");
}
