//! Allow-list extraction from a ZIP stream.
//!
//! Entries are read sequentially, so extraction starts while the archive is
//! still downloading. Only entries whose parent directory equals the filter's
//! directory and whose file name is on the allow-list are decompressed. Every
//! other entry is skipped over in its compressed form. Output names come from
//! the allow-list, never from the archive, so an entry cannot escape the
//! target directory.

use crate::core::cancel::CancelToken;
use crate::core::download::classify_read_error;
use crate::core::events::{InstallEvent, InstallObserver};
use crate::error::{PgkitError, Result};
use crate::utils::fs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use zip::result::ZipError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFilter {
    /// Directory inside the archive, `/`-separated, without trailing slash.
    pub directory: String,
    pub files: BTreeSet<String>,
}

impl FileFilter {
    pub fn new<I, S>(directory: &str, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            directory: normalize_entry_name(directory).trim_matches('/').to_string(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    /// The output file name for `entry_name`, or `None` when the entry is not selected.
    pub fn select(&self, entry_name: &str) -> Option<String> {
        let normalized = normalize_entry_name(entry_name);
        let (parent, file) = normalized.rsplit_once('/').unwrap_or(("", &normalized));

        if parent != self.directory || file.is_empty() {
            return None;
        }
        self.files.get(file).cloned()
    }
}

fn normalize_entry_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    name.strip_prefix("./").unwrap_or(&name).to_string()
}

pub struct ArchiveExtractor<'a> {
    filter: &'a FileFilter,
    observer: &'a dyn InstallObserver,
    cancel: CancelToken,
}

impl<'a> ArchiveExtractor<'a> {
    pub fn new(filter: &'a FileFilter, observer: &'a dyn InstallObserver, cancel: CancelToken) -> Self {
        Self {
            filter,
            observer,
            cancel,
        }
    }

    /// Extract the selected entries of the ZIP archive read from `reader` into
    /// `target_dir`, replacing files of the same name.
    ///
    /// Returns the written paths in archive order.
    pub fn extract<R: Read>(&self, reader: &mut R, target_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        loop {
            if self.cancel.is_cancelled() {
                return Err(PgkitError::Cancelled);
            }

            let Some(mut entry) =
                zip::read::read_zipfile_from_stream(reader).map_err(classify_zip_error)?
            else {
                break;
            };

            let Some(name) = self.filter.select(entry.name()) else {
                tracing::trace!("Skipping archive entry {}", entry.name());
                continue;
            };

            self.observer
                .notify(&InstallEvent::ExtractingFile { name: name.clone() });

            let dest = target_dir.join(&name);
            let bytes = write_entry(&mut entry, &dest)?;
            tracing::debug!("Extracted {} ({bytes} bytes)", dest.display());

            self.observer
                .notify(&InstallEvent::FileExtracted { name, bytes });
            written.push(dest);
        }

        if written.is_empty() {
            return Err(PgkitError::archive(format!(
                "no allow-listed files found under '{}'",
                self.filter.directory
            )));
        }

        Ok(written)
    }
}

fn classify_zip_error(error: ZipError) -> PgkitError {
    match error {
        ZipError::Io(e) => classify_read_error(e),
        other => PgkitError::archive(other.to_string()),
    }
}

/// Decompress `entry` next to `dest` and move it into place once complete.
fn write_entry<R: Read>(entry: &mut R, dest: &Path) -> Result<u64> {
    let partial = fs::partial_path(dest);
    let mut file = File::create(&partial).map_err(|e| PgkitError::filesystem(&partial, e))?;

    let copied = copy_entry(entry, &mut file, &partial);
    drop(file);

    match copied {
        Ok(bytes) => {
            fs::replace_file(&partial, dest)?;
            Ok(bytes)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            Err(e)
        }
    }
}

/// Copy with read and write failures kept apart: a failed read is a transfer or
/// archive problem, a failed write is a filesystem one.
fn copy_entry<R: Read>(entry: &mut R, file: &mut File, path: &Path) -> Result<u64> {
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;

    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(classify_read_error(e)),
        };
        file.write_all(&buf[..n])
            .map_err(|e| PgkitError::filesystem(path, e))?;
        total += n as u64;
    }

    file.sync_all().map_err(|e| PgkitError::filesystem(path, e))?;
    Ok(total)
}
