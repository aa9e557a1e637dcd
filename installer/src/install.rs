//! Distribution archive installation.
//!
//! The release tarball wraps a directory of Debian packages. Installation
//! obtains the tarball (cache first), refuses anything that is not gzip,
//! unpacks the packages into scratch space inside the cache directory,
//! locates the executable by name and copies the tree around it into the
//! build directory.

use crate::archive::ExtractionError;
use crate::archive::deb::extract_deb;
use crate::archive::file_type::{FileType, sniff_file};
use crate::archive::tarball::unpack_tar_gz;
use crate::config::{BuildpackConfig, EXECUTABLE_NAME};
use crate::error::{BuildpackError, Result};
use crate::fetch::Fetcher;
use crate::output::Reporter;
use crate::receipt::compute_sha256;
use crate::tree::{copy_tree, find_child_dir, find_file_named, listing};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::fs;
use tempfile::TempDir;

/// Depth of the directory listings attached to diagnostics.
const LISTING_DEPTH: usize = 4;

/// Prefix of the scratch directory the release archive is unpacked into.
pub const UNPACKED_SCRATCH_PREFIX: &str = ".unpacked-";
/// Prefix of the scratch directory the inner packages are unpacked into.
pub const PACKAGES_SCRATCH_PREFIX: &str = ".packages-";

/// Result of a successful installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Location of the distribution archive in the cache.
    pub archive_path: Utf8PathBuf,
    /// Lowercase hex SHA-256 of the archive.
    pub archive_sha256: String,
    /// Whether the archive was reused from the cache.
    pub from_cache: bool,
    /// Number of packages unpacked from the archive.
    pub packages_unpacked: usize,
    /// Installation root relative to the unpacked package tree, e.g.
    /// `opt/libreoffice7.6`; empty for flat layouts.
    pub layout_root: Utf8PathBuf,
    /// Number of files and links copied into the build directory.
    pub files_copied: usize,
    /// Installed executable.
    pub executable: Utf8PathBuf,
}

/// Installs the distribution into `<build>/libreoffice`.
///
/// # Errors
///
/// Returns [`BuildpackError::ArchiveDownload`] when the archive is not cached
/// and cannot be fetched, [`BuildpackError::ArchiveInvalid`] when it is not a
/// gzip file, [`BuildpackError::TopLevelDirMissing`],
/// [`BuildpackError::ExecutableNotFound`] and
/// [`BuildpackError::ExecutableMissingAfterCopy`] when the layout is not as
/// expected, and extraction or copy errors otherwise.
pub fn install_archive(
    config: &BuildpackConfig,
    fetcher: &dyn Fetcher,
    reporter: &mut Reporter<'_>,
) -> Result<InstallOutcome> {
    let archive_path = config.cached_archive_path();
    let from_cache = obtain_archive(config, fetcher, reporter)?;
    if let Err(err) = validate_archive(&archive_path) {
        discard_archive(&archive_path);
        return Err(err);
    }
    let archive_sha256 = compute_sha256(&archive_path)?;

    let (_unpacked, unpacked_dir) = scratch_dir(config.cache_dir(), UNPACKED_SCRATCH_PREFIX)?;
    unpack_tar_gz(archive_path.as_std_path(), unpacked_dir.as_std_path()).map_err(|source| {
        BuildpackError::Extraction {
            archive: archive_path.clone(),
            source,
        }
    })?;
    let top = find_top_level_dir(&unpacked_dir)?;

    let (_packages, packages_dir) = scratch_dir(config.cache_dir(), PACKAGES_SCRATCH_PREFIX)?;
    let packages_unpacked = unpack_packages(&top.join("DEBS"), &packages_dir)?;
    reporter.detail(format!("Unpacked {packages_unpacked} packages"));

    let found = find_file_named(&packages_dir, EXECUTABLE_NAME)?.ok_or_else(|| {
        BuildpackError::ExecutableNotFound {
            name: EXECUTABLE_NAME.to_owned(),
            dir: packages_dir.clone(),
            listing: listing(&packages_dir, LISTING_DEPTH),
        }
    })?;
    let root = installation_root(&found, &packages_dir);
    let layout_root = root
        .strip_prefix(&packages_dir)
        .map(Utf8Path::to_path_buf)
        .unwrap_or_default();
    debug!("found {found}; installation root {root}");

    let install_dir = config.install_dir();
    if install_dir.exists() {
        fs::remove_dir_all(&install_dir)?;
    }
    let files_copied = copy_tree(&root, &install_dir)?;

    let executable = config.installed_executable();
    if !executable.is_file() {
        return Err(BuildpackError::ExecutableMissingAfterCopy { path: executable });
    }
    reporter.detail(format!("Installed {files_copied} files to {install_dir}"));

    Ok(InstallOutcome {
        archive_path,
        archive_sha256,
        from_cache,
        packages_unpacked,
        layout_root,
        files_copied,
        executable,
    })
}

/// Makes sure the archive is in the cache, returning whether it already was.
fn obtain_archive(
    config: &BuildpackConfig,
    fetcher: &dyn Fetcher,
    reporter: &mut Reporter<'_>,
) -> Result<bool> {
    let archive_path = config.cached_archive_path();
    if archive_path.is_file() {
        reporter.detail(format!("Using cached {}", config.archive_filename()));
        return Ok(true);
    }

    let url = config.archive_url();
    reporter.detail(format!("Downloading {url}"));
    fs::create_dir_all(config.cache_dir())?;
    let bytes = fetcher
        .fetch_to_file(&url, archive_path.as_std_path())
        .map_err(|source| BuildpackError::ArchiveDownload {
            url: url.clone(),
            source,
        })?;
    debug!("downloaded {bytes} bytes to {archive_path}");
    Ok(false)
}

/// Removes a rejected archive so the next build downloads it again.
fn discard_archive(path: &Utf8Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("discarded invalid archive {path}"),
        Err(e) => warn!("failed to remove invalid archive {path}: {e}"),
    }
}

/// Rejects an archive whose leading bytes are not gzip.
///
/// # Errors
///
/// Returns [`BuildpackError::ArchiveInvalid`] with the detected type and a
/// preview of the content, or an I/O error if the file cannot be read.
pub fn validate_archive(path: &Utf8Path) -> Result<()> {
    let sniffed = sniff_file(path.as_std_path())?;
    if sniffed.file_type == FileType::Gzip {
        return Ok(());
    }
    Err(BuildpackError::ArchiveInvalid {
        path: path.to_owned(),
        file_type: sniffed.file_type.to_string(),
        preview: sniffed.preview,
    })
}

/// Finds the unpacked release directory (`LibreOffice_*_deb`) inside `dir`.
///
/// # Errors
///
/// Returns [`BuildpackError::TopLevelDirMissing`] with a listing of `dir`
/// when no such directory exists.
pub fn find_top_level_dir(dir: &Utf8Path) -> Result<Utf8PathBuf> {
    let found = find_child_dir(dir, |name| {
        name.starts_with("LibreOffice_") && name.ends_with("_deb")
    })?;
    found.ok_or_else(|| BuildpackError::TopLevelDirMissing {
        dir: dir.to_owned(),
        pattern: "LibreOffice_*_deb".to_owned(),
        listing: listing(dir, 2),
    })
}

/// Unpacks every `*.deb` in `debs_dir` into `dest`, in name order.
///
/// Packages with an unsupported payload compression are skipped; any other
/// extraction failure aborts.
fn unpack_packages(debs_dir: &Utf8Path, dest: &Utf8Path) -> Result<usize> {
    let packages = package_files(debs_dir)?;
    let mut unpacked = 0;
    for package in packages {
        match extract_deb(package.as_std_path(), dest.as_std_path()) {
            Ok(files) => {
                debug!("unpacked {} files from {package}", files.len());
                unpacked += 1;
            }
            Err(ExtractionError::UnsupportedCompression { member }) => {
                debug!("skipping {package}: unsupported payload {member}");
            }
            Err(source) => {
                return Err(BuildpackError::Extraction {
                    archive: package,
                    source,
                });
            }
        }
    }
    Ok(unpacked)
}

fn package_files(debs_dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    if !debs_dir.is_dir() {
        debug!("{debs_dir} does not exist; no packages to unpack");
        return Ok(Vec::new());
    }
    let mut packages = Vec::new();
    for entry in debs_dir.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_file() && entry.file_name().ends_with(".deb") {
            packages.push(entry.into_path());
        }
    }
    packages.sort();
    Ok(packages)
}

/// The directory two levels above the executable (`<root>/program/soffice`),
/// never escaping `tree`.
fn installation_root(executable: &Utf8Path, tree: &Utf8Path) -> Utf8PathBuf {
    executable
        .parent()
        .and_then(Utf8Path::parent)
        .filter(|root| root.starts_with(tree))
        .unwrap_or(tree)
        .to_path_buf()
}

fn scratch_dir(parent: &Utf8Path, prefix: &str) -> Result<(TempDir, Utf8PathBuf)> {
    fs::create_dir_all(parent)?;
    let temp = tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?;
    let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).map_err(|p| {
        BuildpackError::NonUtf8Path {
            path: p.display().to_string(),
        }
    })?;
    Ok((temp, path))
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
