//! File-level operations: encrypt, decrypt, pack and unpack.
//!
//! Encrypting runs passphrase → key → archive blob → nonce → seal → write.
//! Decrypting runs read → length check → passphrase → key → open → write.
//! The final write is the only side effect of either path, so a failure at
//! any earlier step leaves nothing behind.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::archive::{self, ExtractReport};
use crate::cipher::Aes256GcmCipher;
use crate::container::{self, SealedContainer};
use crate::error::{ErrorCategory, ErrorKind, Result, SecureError};
use crate::kdf;
use crate::passphrase::PassphraseReader;
use crate::persist;

/// Appended to the source path to name a sealed container.
pub const ENCRYPTED_SUFFIX: &str = ".encrypted";

/// Appended to the source path to name a plain archive.
pub const ARCHIVE_SUFFIX: &str = ".archive";

/// Appended to a container path that lacks [`ENCRYPTED_SUFFIX`] when
/// recovering raw bytes.
pub const DECRYPTED_SUFFIX: &str = ".decrypted";

/// What gets sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// The path (file or directory) is packed into an archive first.
    Archive,
    /// The path must be a file; its bytes are sealed as they are.
    Raw,
}

/// Where recovered plaintext goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptTarget {
    /// Unpack the recovered archive below this directory.
    Extract(PathBuf),
    /// Write the recovered bytes to this file.
    Raw(PathBuf),
}

#[derive(Debug)]
pub enum DecryptOutcome {
    Extracted(ExtractReport),
    Written(PathBuf),
}

/// Encrypt `source` into a sealed container at `output`.
pub fn encrypt_path(
    source: &Path,
    output: &Path,
    payload: Payload,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    encrypt_path_with_rng(source, output, payload, passphrase_reader, &mut OsRng)
}

/// [`encrypt_path`] with an explicit nonce source.
pub fn encrypt_path_with_rng<R>(
    source: &Path,
    output: &Path,
    payload: Payload,
    passphrase_reader: &mut dyn PassphraseReader,
    rng: &mut R,
) -> Result<()>
where
    R: RngCore + CryptoRng + ?Sized,
{
    // Refuse a bad input before prompting for anything.
    let metadata = fs::metadata(source)
        .map_err(|e| SecureError::io(format!("failed to read from {}", source.display()), e))?;
    if payload == Payload::Raw && !metadata.is_file() {
        return Err(SecureError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidInput,
            format!("{} is not a file; raw mode seals single files", source.display()),
        ));
    }

    let passphrase = passphrase_reader.read_passphrase()?;
    debug!("deriving key");
    let key = kdf::derive_key(&passphrase);
    drop(passphrase);

    debug!(source = %source.display(), ?payload, "serializing");
    let plaintext = Zeroizing::new(match payload {
        Payload::Archive => archive::pack(source)?,
        Payload::Raw => fs::read(source)
            .map_err(|e| SecureError::io(format!("failed to read from {}", source.display()), e))?,
    });

    debug!(bytes = plaintext.len(), "sealing");
    let sealed =
        container::seal(&key, &plaintext, rng).map_err(|e| e.with_context("encryption failed"))?;

    persist::write_atomic(output, &sealed)
        .map_err(|e| e.with_context(format!("failed to write to {}", output.display())))?;
    info!(output = %output.display(), bytes = sealed.len(), "wrote sealed container");
    Ok(())
}

/// Decrypt the container at `input` into `target`.
///
/// Authentication failure is reported once, generically, and nothing is
/// written.
pub fn decrypt_path(
    input: &Path,
    target: &DecryptTarget,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<DecryptOutcome> {
    let bytes = fs::read(input)
        .map_err(|e| SecureError::io(format!("failed to read from {}", input.display()), e))?;
    let sealed = SealedContainer::parse(&bytes)?;

    let passphrase = passphrase_reader.read_passphrase()?;
    debug!("deriving key");
    let key = kdf::derive_key(&passphrase);
    drop(passphrase);

    debug!(bytes = sealed.body().len(), "opening");
    let cipher = Aes256GcmCipher::new(&key)?;
    let plaintext = Zeroizing::new(sealed.open(&cipher)?);

    match target {
        DecryptTarget::Extract(dest) => {
            debug!(dest = %dest.display(), "deserializing");
            let report = archive::extract(&plaintext, dest)
                .map_err(|e| e.with_context("failed to unpack decrypted archive"))?;
            info!(
                written = report.written.len(),
                skipped = report.skipped,
                "extracted decrypted archive"
            );
            Ok(DecryptOutcome::Extracted(report))
        }
        DecryptTarget::Raw(output) => {
            persist::write_atomic(output, &plaintext)
                .map_err(|e| e.with_context(format!("failed to write to {}", output.display())))?;
            info!(output = %output.display(), "wrote decrypted file");
            Ok(DecryptOutcome::Written(output.clone()))
        }
    }
}

/// Write an unencrypted archive of `source` to `output`.
pub fn pack_path(source: &Path, output: &Path) -> Result<()> {
    let blob = archive::pack(source)?;
    persist::write_atomic(output, &blob)
        .map_err(|e| e.with_context(format!("failed to write to {}", output.display())))?;
    info!(output = %output.display(), bytes = blob.len(), "wrote archive");
    Ok(())
}

/// Extract an unencrypted archive below `dest`.
pub fn unpack_path(input: &Path, dest: &Path) -> Result<ExtractReport> {
    let blob = fs::read(input)
        .map_err(|e| SecureError::io(format!("failed to read from {}", input.display()), e))?;
    let report = archive::extract(&blob, dest)?;
    info!(
        written = report.written.len(),
        skipped = report.skipped,
        "extracted archive"
    );
    Ok(report)
}

/// `<source>.encrypted`
pub fn default_encrypted_path(source: &Path) -> Result<PathBuf> {
    with_suffix(source, ENCRYPTED_SUFFIX)
}

/// `<source>.archive`
pub fn default_archive_path(source: &Path) -> Result<PathBuf> {
    with_suffix(source, ARCHIVE_SUFFIX)
}

/// The container path minus `.encrypted`, or plus `.decrypted` if it has no
/// such suffix.
pub fn default_decrypted_path(input: &Path) -> Result<PathBuf> {
    let name = file_name(input)?;
    match name.strip_suffix(ENCRYPTED_SUFFIX) {
        Some(stem) if !stem.is_empty() => Ok(input.with_file_name(stem)),
        _ => with_suffix(input, DECRYPTED_SUFFIX),
    }
}

fn with_suffix(path: &Path, suffix: &str) -> Result<PathBuf> {
    let name = file_name(path)?;
    Ok(path.with_file_name(format!("{}{}", name, suffix)))
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        SecureError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidInput,
            format!(
                "cannot derive an output name from {}; pass --output explicitly",
                path.display()
            ),
        )
    })
}
