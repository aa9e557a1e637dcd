//! Filesystem tree helpers: search, listing and copying.
//!
//! Archive layouts vary between releases, so the installer discovers
//! locations by searching rather than assuming fixed relative paths.

use crate::error::{BuildpackError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use walkdir::WalkDir;

/// Maximum number of lines included in a diagnostic listing.
const LISTING_LIMIT: usize = 40;

/// Finds the first regular file (or symlink) named `name` under `root`.
///
/// Entries are visited in sorted order so the result is deterministic when
/// several packages ship a file of the same name.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked or a path is not UTF-8.
pub fn find_file_named(root: &Utf8Path, name: &str) -> Result<Option<Utf8PathBuf>> {
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(walk_error)?;
        if entry.file_type().is_dir() || entry.file_name() != name {
            continue;
        }
        return utf8(entry.into_path()).map(Some);
    }
    Ok(None)
}

/// Finds an immediate subdirectory of `dir` whose name satisfies `matches`.
///
/// # Errors
///
/// Returns an error if `dir` cannot be read or a path is not UTF-8.
pub fn find_child_dir<F>(dir: &Utf8Path, matches: F) -> Result<Option<Utf8PathBuf>>
where
    F: Fn(&str) -> bool,
{
    let mut candidates = Vec::new();
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_dir() && matches(entry.file_name()) {
            candidates.push(entry.into_path());
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Renders a bounded, sorted listing of `root` for diagnostics.
///
/// Paths are relative to `root`; directories carry a trailing `/`. Walk
/// errors are rendered inline rather than propagated, since a listing is
/// only ever built on the way to reporting another failure.
#[must_use]
pub fn listing(root: &Utf8Path, max_depth: usize) -> String {
    let mut lines = Vec::new();
    let mut total = 0usize;
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        total += 1;
        if lines.len() >= LISTING_LIMIT {
            continue;
        }
        match entry {
            Ok(entry) => {
                let relative = entry
                    .path()
                    .strip_prefix(root)
                    .unwrap_or_else(|_| entry.path())
                    .display()
                    .to_string();
                let suffix = if entry.file_type().is_dir() { "/" } else { "" };
                lines.push(format!("  {relative}{suffix}"));
            }
            Err(e) => lines.push(format!("  <unreadable: {e}>")),
        }
    }
    if total == 0 {
        return "  (empty)".to_owned();
    }
    if total > lines.len() {
        lines.push(format!("  ... and {} more", total - lines.len()));
    }
    lines.join("\n")
}

/// Copies the contents of `from` into `to`, creating `to` as needed.
///
/// Directories are recreated, regular files copied with their permissions
/// and symbolic links recreated as links. Existing files and links at the
/// destination are replaced.
///
/// # Errors
///
/// Returns [`BuildpackError::CopyFailed`] describing the first entry that
/// could not be copied.
pub fn copy_tree(from: &Utf8Path, to: &Utf8Path) -> Result<usize> {
    let fail = |reason: String| BuildpackError::CopyFailed {
        from: from.to_owned(),
        to: to.to_owned(),
        reason,
    };
    fs::create_dir_all(to).map_err(|e| fail(format!("creating {to}: {e}")))?;

    let mut copied = 0;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(|e| fail(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| fail(e.to_string()))?;
        let dest = to.as_std_path().join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&dest)
                .map_err(|e| fail(format!("creating {}: {e}", dest.display())))?;
            continue;
        }

        replace_existing(&dest).map_err(|e| fail(format!("replacing {}: {e}", dest.display())))?;
        if file_type.is_symlink() {
            copy_symlink(entry.path(), &dest)
                .map_err(|e| fail(format!("linking {}: {e}", dest.display())))?;
        } else {
            fs::copy(entry.path(), &dest)
                .map_err(|e| fail(format!("copying {}: {e}", entry.path().display())))?;
        }
        copied += 1;
    }
    Ok(copied)
}

fn replace_existing(path: &std::path::Path) -> std::io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn copy_symlink(src: &std::path::Path, dest: &std::path::Path) -> std::io::Result<()> {
    let target = fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(not(unix))]
fn copy_symlink(src: &std::path::Path, dest: &std::path::Path) -> std::io::Result<()> {
    fs::copy(src, dest).map(|_| ())
}

/// Converts a walked path to UTF-8.
pub(crate) fn utf8(path: std::path::PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).map_err(|p| BuildpackError::NonUtf8Path {
        path: p.display().to_string(),
    })
}

fn walk_error(err: walkdir::Error) -> BuildpackError {
    BuildpackError::Io(std::io::Error::other(err.to_string()))
}
