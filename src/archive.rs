//! Archive codec: a directory tree as one byte blob, and back.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! magic   : 8 bytes "SECARC01"
//! count   : u32
//! entry*  : name_len u16 | name (UTF-8, '/'-separated) | data_len u64 | data
//! ```
//!
//! Entry names are relative and always use `/`, whatever the platform.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ErrorCategory, ErrorKind, Result, SecureError};
use crate::persist;

const MAGIC: &[u8; 8] = b"SECARC01";

/// One file inside an archive, borrowing its bytes from the blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    pub name: String,
    pub data: &'a [u8],
}

/// Accumulates entries and serializes them on [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, data: Vec<u8>) -> Result<()> {
        let name = name.into();
        if name.len() > u16::MAX as usize {
            return Err(SecureError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidInput,
                format!("entry name too long ({} bytes): {}", name.len(), name),
            ));
        }
        if self.entries.len() >= u32::MAX as usize {
            return Err(SecureError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidInput,
                "too many entries for one archive",
            ));
        }
        self.entries.push((name, data));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        let payload: usize = self
            .entries
            .iter()
            .map(|(name, data)| 2 + name.len() + 8 + data.len())
            .sum();
        let mut out = Vec::with_capacity(MAGIC.len() + 4 + payload);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for (name, data) in &self.entries {
            out.extend_from_slice(&(name.len() as u16).to_be_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&(data.len() as u64).to_be_bytes());
            out.extend_from_slice(data);
        }
        out
    }
}

/// Serialize `root` into an archive blob.
///
/// A file becomes a single entry named after it. A directory contributes
/// every regular file below it, named `<dir name>/<relative path>` and
/// sorted by name. Symlinks and special files are skipped. Any I/O error
/// aborts the whole pack.
pub fn pack(root: &Path) -> Result<Vec<u8>> {
    let metadata = fs::metadata(root)
        .map_err(|e| SecureError::io(format!("failed to stat {}", root.display()), e))?;
    let root_name = root_name(root)?;

    let mut files = Vec::new();
    if metadata.is_dir() {
        walk(root, &root_name, &mut files)?;
    } else if metadata.is_file() {
        files.push((root_name, root.to_path_buf()));
    } else {
        return Err(SecureError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidInput,
            format!("{} is neither a file nor a directory", root.display()),
        ));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut builder = ArchiveBuilder::new();
    for (name, path) in files {
        let data = fs::read(&path)
            .map_err(|e| SecureError::io(format!("failed to read from {}", path.display()), e))?;
        debug!(entry = %name, bytes = data.len(), "adding archive entry");
        builder.add(name, data)?;
    }
    Ok(builder.finish())
}

fn root_name(root: &Path) -> Result<String> {
    let name = match root.file_name() {
        Some(name) => name.to_owned(),
        None => root
            .canonicalize()
            .map_err(|e| SecureError::io(format!("failed to resolve {}", root.display()), e))?
            .file_name()
            .map(|n| n.to_owned())
            .ok_or_else(|| {
                SecureError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::InvalidInput,
                    format!("cannot archive {}: it has no name", root.display()),
                )
            })?,
    };
    utf8_name(&name, root)
}

fn utf8_name(name: &std::ffi::OsStr, path: &Path) -> Result<String> {
    name.to_str().map(str::to_owned).ok_or_else(|| {
        SecureError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidInput,
            format!("file name is not valid UTF-8: {}", path.display()),
        )
    })
}

/// Recursively collect (entry name, path) pairs for regular files.
fn walk(dir: &Path, prefix: &str, files: &mut Vec<(String, PathBuf)>) -> Result<()> {
    let read_dir = fs::read_dir(dir)
        .map_err(|e| SecureError::io(format!("failed to read directory {}", dir.display()), e))?;
    for entry in read_dir {
        let entry = entry
            .map_err(|e| SecureError::io(format!("failed to read directory {}", dir.display()), e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| SecureError::io(format!("failed to stat {}", path.display()), e))?;
        let name = format!("{}/{}", prefix, utf8_name(&entry.file_name(), &path)?);

        if file_type.is_dir() {
            walk(&path, &name, files)?;
        } else if file_type.is_file() {
            files.push((name, path));
        } else {
            debug!(path = %path.display(), "skipping non-regular file");
        }
    }
    Ok(())
}

/// Begin decoding a blob.
///
/// Only the header is checked here. Entries are decoded lazily, one per
/// call to `next`, and a malformed entry shows up as an `Err` item.
pub fn unpack(blob: &[u8]) -> Result<Entries<'_>> {
    if blob.len() < MAGIC.len() || &blob[..MAGIC.len()] != MAGIC {
        return Err(format_error("input is not an archive (bad magic)"));
    }
    let rest = &blob[MAGIC.len()..];
    if rest.len() < 4 {
        return Err(format_error("archive truncated while reading entry count"));
    }
    let (count, rest) = rest.split_at(4);
    let mut count_bytes = [0u8; 4];
    count_bytes.copy_from_slice(count);

    Ok(Entries {
        rest,
        remaining: u32::from_be_bytes(count_bytes),
        index: 0,
        done: false,
    })
}

/// Single-pass iterator over the entries of a blob.
#[derive(Debug)]
pub struct Entries<'a> {
    rest: &'a [u8],
    remaining: u32,
    index: u32,
    done: bool,
}

impl<'a> Entries<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.rest.len() < n {
            return Err(format_error(format!(
                "archive truncated while reading {} of entry {}",
                what, self.index
            )));
        }
        let rest: &'a [u8] = self.rest;
        let (head, tail) = rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    fn next_entry(&mut self) -> Result<Entry<'a>> {
        let mut name_len = [0u8; 2];
        name_len.copy_from_slice(self.take(2, "name length")?);
        let name = self.take(u16::from_be_bytes(name_len) as usize, "name")?;

        let mut data_len = [0u8; 8];
        data_len.copy_from_slice(self.take(8, "data length")?);
        let data_len = u64::from_be_bytes(data_len);
        let data_len = usize::try_from(data_len)
            .ok()
            .filter(|len| *len <= self.rest.len())
            .ok_or_else(|| {
                format_error(format!(
                    "entry {} claims {} bytes but only {} remain",
                    self.index,
                    data_len,
                    self.rest.len()
                ))
            })?;
        let data = self.take(data_len, "data")?;

        // Framing is intact at this point, so a bad name only costs this entry.
        let name = std::str::from_utf8(name).map_err(|e| {
            SecureError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::ArchiveEntry,
                format!("entry {} has a name that is not valid UTF-8", self.index),
                e,
            )
        })?;
        Ok(Entry {
            name: name.to_owned(),
            data,
        })
    }
}

impl<'a> Iterator for Entries<'a> {
    type Item = Result<Entry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.remaining == 0 {
            self.done = true;
            if self.rest.is_empty() {
                return None;
            }
            return Some(Err(format_error(format!(
                "{} unexpected bytes after last entry",
                self.rest.len()
            ))));
        }

        let item = self.next_entry();
        if let Err(e) = &item {
            if e.kind == Some(ErrorKind::ArchiveFormat) {
                // Lost framing; nothing after this can be trusted.
                self.done = true;
            }
        }
        self.remaining -= 1;
        self.index += 1;
        Some(item)
    }
}

/// Outcome of [`extract`].
#[derive(Debug, Default)]
pub struct ExtractReport {
    /// Files written, in archive order.
    pub written: Vec<PathBuf>,
    /// Entries that could not be decoded or written.
    pub skipped: usize,
}

/// Write every entry of `blob` below `dest`.
///
/// A blob that is not an archive at all is an error. Past that point each
/// entry stands alone: failures are logged, counted and skipped.
pub fn extract(blob: &[u8], dest: &Path) -> Result<ExtractReport> {
    let entries = unpack(blob)?;
    fs::create_dir_all(dest)
        .map_err(|e| SecureError::io(format!("failed to create {}", dest.display()), e))?;

    let mut report = ExtractReport::default();
    for item in entries {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e.report(), "skipping unreadable archive entry");
                report.skipped += 1;
                continue;
            }
        };
        match write_entry(dest, &entry) {
            Ok(path) => {
                debug!(entry = %entry.name, bytes = entry.data.len(), "extracted");
                report.written.push(path);
            }
            Err(e) => {
                warn!(entry = %entry.name, error = %e.report(), "skipping archive entry");
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

fn write_entry(dest: &Path, entry: &Entry<'_>) -> Result<PathBuf> {
    let relative = entry_path(&entry.name).ok_or_else(|| {
        SecureError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArchiveEntry,
            format!("refusing unsafe entry name {:?}", entry.name),
        )
    })?;
    let path = dest.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            SecureError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::ArchiveEntry,
                format!("failed to create directory {}", parent.display()),
                e,
            )
        })?;
    }
    persist::write_file_secure(&path, entry.data).map_err(|mut e| {
        e.kind = Some(ErrorKind::ArchiveEntry);
        e
    })?;
    Ok(path)
}

/// Map an entry name to a relative path that stays inside the destination.
///
/// Empty names, absolute names and names with `..` are rejected.
fn entry_path(name: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn format_error(msg: impl Into<String>) -> SecureError {
    SecureError::with_kind(ErrorCategory::User, ErrorKind::ArchiveFormat, msg)
}
