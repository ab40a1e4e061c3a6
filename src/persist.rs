//! Writing results to disk.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{ErrorCategory, ErrorKind, Result, SecureError};

/// Write file with secure permissions (0o600 on Unix)
pub fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| SecureError::io(format!("failed to open {}", path.display()), e))?;

        file.write_all(contents)
            .map_err(|e| SecureError::io(format!("failed to write {}", path.display()), e))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents)
            .map_err(|e| SecureError::io(format!("failed to write {}", path.display()), e))?;
        Ok(())
    }
}

/// Replace `path` with `contents` atomically.
///
/// The data goes to a tempfile next to the target, is fsync'd, restricted to
/// 0o600 on Unix and then renamed over the target. Either the old file (or
/// nothing) or the complete new file exists afterwards, never a partial one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Err(SecureError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("output directory {} does not exist", dir.display()),
        ));
    }

    let mut temp_file = tempfile::Builder::new()
        .prefix(".secure-tmp")
        .tempfile_in(dir)
        .map_err(|e| SecureError::io("failed to create tempfile", e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| SecureError::io("failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename, if it succeeds, always points
    // at a complete file.
    temp_file
        .flush()
        .map_err(|e| SecureError::io("failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| SecureError::io("failed to sync file prior to rename", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| SecureError::io("failed to set tempfile permissions", e))?;
    }

    temp_file.persist(path).map_err(|e| {
        SecureError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}
