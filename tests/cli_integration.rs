//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn secure_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_secure"))
}

/// Run secure in `cwd` with the passphrase piped through stdin
fn run_with_passphrase(cwd: &Path, args: &[&str], passphrase: &str) -> Output {
    let mut child = Command::new(secure_bin())
        .current_dir(cwd)
        .arg("--passphrase-stdin")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn secure");

    {
        let mut stdin = child.stdin.take().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading
        // stdin if it fails early (e.g., file not found)
        let _ = stdin.write_all(passphrase.as_bytes());
    }

    child.wait_with_output().expect("failed to wait on secure")
}

fn run(cwd: &Path, args: &[&str]) -> Output {
    Command::new(secure_bin())
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("failed to run secure")
}

fn testdata_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("testdata");
    path.push(filename);
    path
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn make_tree(base: &Path) {
    let root = base.join("docs");
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("a.txt"), "hello").unwrap();
    fs::write(root.join("sub").join("b.txt"), "world").unwrap();
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).unwrap().next().is_none()
}

#[test]
fn test_directory_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    make_tree(temp_dir.path());
    let restored = temp_dir.path().join("restored");
    fs::create_dir(&restored).unwrap();

    let result = run_with_passphrase(temp_dir.path(), &["encrypt", "docs"], "correct-horse");
    assert!(result.status.success(), "encrypt failed: {}", stderr(&result));
    assert!(temp_dir.path().join("docs.encrypted").exists());

    let result = run_with_passphrase(
        temp_dir.path(),
        &["decrypt", "docs.encrypted", "-C", "restored"],
        "correct-horse",
    );
    assert!(result.status.success(), "decrypt failed: {}", stderr(&result));

    assert_eq!(
        fs::read_to_string(restored.join("docs/a.txt")).unwrap(),
        "hello"
    );
    assert_eq!(
        fs::read_to_string(restored.join("docs/sub/b.txt")).unwrap(),
        "world"
    );
}

#[test]
fn test_wrong_passphrase_fails_without_output() {
    let temp_dir = TempDir::new().unwrap();
    make_tree(temp_dir.path());
    let restored = temp_dir.path().join("restored");
    fs::create_dir(&restored).unwrap();

    let result = run_with_passphrase(temp_dir.path(), &["encrypt", "docs"], "correct-horse");
    assert!(result.status.success(), "encrypt failed: {}", stderr(&result));

    let result = run_with_passphrase(
        temp_dir.path(),
        &["decrypt", "docs.encrypted", "-C", "restored"],
        "wrong-horse",
    );

    assert!(!result.status.success());
    assert!(
        stderr(&result).contains("decryption failed"),
        "unexpected stderr: {}",
        stderr(&result)
    );
    assert!(is_empty_dir(&restored));
}

#[test]
fn test_truncated_container_fails_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let container = temp_dir.path().join("short.encrypted");
    let full = fs::read(testdata_path("hello.txt.encrypted")).unwrap();
    fs::write(&container, &full[..5]).unwrap();

    let result = run_with_passphrase(
        temp_dir.path(),
        &["decrypt", "--raw", "short.encrypted"],
        "test",
    );

    assert!(!result.status.success());
    let err = stderr(&result);
    assert!(err.contains("too short"), "unexpected stderr: {}", err);
    assert!(!err.contains("panicked"), "unexpected stderr: {}", err);
    assert!(!temp_dir.path().join("short").exists());
}

/// Decrypt a container produced independently of this crate.
#[test]
fn test_decrypt_known_archive() {
    let temp_dir = TempDir::new().unwrap();
    let known = testdata_path("known.encrypted");

    let result = run_with_passphrase(
        temp_dir.path(),
        &["decrypt", known.to_str().unwrap(), "-C", "."],
        "correct-horse",
    );
    assert!(result.status.success(), "decrypt failed: {}", stderr(&result));

    let root = temp_dir.path().join("known");
    assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "hello");
    assert_eq!(fs::read_to_string(root.join("sub/b.txt")).unwrap(), "world");
}

#[test]
fn test_decrypt_known_raw_file() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("hello-decrypted.txt");

    let result = run_with_passphrase(
        temp_dir.path(),
        &[
            "decrypt",
            "--raw",
            testdata_path("hello.txt.encrypted").to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ],
        "test",
    );
    assert!(result.status.success(), "decrypt failed: {}", stderr(&result));

    let decrypted = fs::read_to_string(&output).unwrap();
    let expected = fs::read_to_string(testdata_path("hello.txt")).unwrap();
    assert_eq!(decrypted, expected);
}

#[test]
fn test_raw_roundtrip_default_names() {
    let temp_dir = TempDir::new().unwrap();
    let plain = temp_dir.path().join("notes.txt");
    fs::write(&plain, "raw mode").unwrap();

    let result = run_with_passphrase(temp_dir.path(), &["e", "--raw", "notes.txt"], "pw");
    assert!(result.status.success(), "encrypt failed: {}", stderr(&result));
    fs::remove_file(&plain).unwrap();

    let result = run_with_passphrase(temp_dir.path(), &["d", "--raw", "notes.txt.encrypted"], "pw");
    assert!(result.status.success(), "decrypt failed: {}", stderr(&result));
    assert_eq!(fs::read_to_string(&plain).unwrap(), "raw mode");
}

#[test]
fn test_encrypt_twice_gives_different_containers() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("same.txt"), "same").unwrap();

    for out in ["one.encrypted", "two.encrypted"] {
        let result = run_with_passphrase(
            temp_dir.path(),
            &["encrypt", "same.txt", "-o", out],
            "pw",
        );
        assert!(result.status.success(), "encrypt failed: {}", stderr(&result));
    }

    let one = fs::read(temp_dir.path().join("one.encrypted")).unwrap();
    let two = fs::read(temp_dir.path().join("two.encrypted")).unwrap();
    assert_ne!(one, two);
}

#[test]
fn test_encrypt_nonexistent_file_fails() {
    let temp_dir = TempDir::new().unwrap();

    let result = run_with_passphrase(temp_dir.path(), &["encrypt", "missing"], "pw");

    assert!(!result.status.success());
    assert!(stderr(&result).contains("missing"));
    assert!(!temp_dir.path().join("missing.encrypted").exists());
}

#[test]
fn test_pack_unpack_commands() {
    let temp_dir = TempDir::new().unwrap();
    make_tree(temp_dir.path());
    let unpacked = temp_dir.path().join("unpacked");

    let result = run(temp_dir.path(), &["pack", "docs"]);
    assert!(result.status.success(), "pack failed: {}", stderr(&result));
    assert!(temp_dir.path().join("docs.archive").exists());

    let result = run(temp_dir.path(), &["unpack", "docs.archive", "-C", "unpacked"]);
    assert!(result.status.success(), "unpack failed: {}", stderr(&result));
    assert_eq!(
        fs::read_to_string(unpacked.join("docs/a.txt")).unwrap(),
        "hello"
    );
    assert_eq!(
        fs::read_to_string(unpacked.join("docs/sub/b.txt")).unwrap(),
        "world"
    );
}

#[test]
fn test_missing_arguments_fail() {
    let temp_dir = TempDir::new().unwrap();
    let result = run(temp_dir.path(), &["encrypt"]);
    assert!(!result.status.success());
    assert!(is_empty_dir(temp_dir.path()));
}
