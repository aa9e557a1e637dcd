//! Tar stream extraction.
//!
//! Unpacks tar streams (plain or gzip-compressed) into a destination
//! directory with path traversal protection to prevent zip-slip attacks.
//! Later entries replace earlier files of the same name, which is what
//! overlaying several packages into one tree requires.

use super::ExtractionError;
use flate2::read::GzDecoder;
use std::io::{BufReader, Read};
use std::path::{Component, Path};

/// Unpacks a `.tar.gz` file into `dest_dir`.
///
/// Returns the relative paths of the non-directory entries extracted.
///
/// # Errors
///
/// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
/// escape the destination directory, [`ExtractionError::EmptyArchive`] if
/// the archive holds no files, and [`ExtractionError::Io`] on I/O failures
/// (including a corrupt gzip stream).
pub fn unpack_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<Vec<String>, ExtractionError> {
    let file = std::fs::File::open(archive_path)?;
    unpack_tar(GzDecoder::new(BufReader::new(file)), dest_dir)
}

/// Unpacks a tar stream into `dest_dir`.
///
/// # Errors
///
/// As for [`unpack_tar_gz`].
pub fn unpack_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<String>, ExtractionError> {
    std::fs::create_dir_all(dest_dir)?;
    let mut archive = tar::Archive::new(reader);
    let mut extracted = Vec::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();

        validate_entry_path(&entry_path)?;

        let is_dir = entry.header().entry_type().is_dir();
        if !is_dir {
            remove_existing(&dest_dir.join(&entry_path))?;
        }

        entry.unpack_in(dest_dir)?;

        if !is_dir {
            extracted.push(normalise(&entry_path));
        }
    }

    if extracted.is_empty() {
        return Err(ExtractionError::EmptyArchive);
    }

    Ok(extracted)
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    if path.is_absolute() {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    for component in path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(ExtractionError::PathTraversal {
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Removes a file or symlink already occupying `path`.
fn remove_existing(path: &Path) -> std::io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if !meta.is_dir() => std::fs::remove_file(path),
        _ => Ok(()),
    }
}

/// Renders an entry path without a leading `./`.
fn normalise(path: &Path) -> String {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect::<std::path::PathBuf>()
        .to_string_lossy()
        .into_owned()
}
