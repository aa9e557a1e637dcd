//! Cache pruning after a successful installation.
//!
//! Downloaded archives are only needed while installing; the installed tree
//! in the build directory is what persists. Scratch directories normally
//! vanish with their run, but a build killed mid-extraction leaves them
//! behind, so pruning sweeps those too.

use crate::config::BuildpackConfig;
use crate::deps::DEB_SCRATCH_PREFIX;
use crate::error::Result;
use crate::install::{PACKAGES_SCRATCH_PREFIX, UNPACKED_SCRATCH_PREFIX};
use camino::Utf8Path;
use log::debug;
use std::fs;
use std::io::ErrorKind;
use walkdir::WalkDir;

/// What pruning removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    /// Number of files deleted.
    pub removed: usize,
    /// Number of leftover scratch directories deleted.
    pub scratch_dirs: usize,
    /// Total size of the deleted files and scratch trees.
    pub bytes_reclaimed: u64,
}

impl CleanupSummary {
    fn record(&mut self, bytes: u64) {
        self.removed += 1;
        self.bytes_reclaimed += bytes;
    }
}

/// Deletes the distribution archive, every cached dependency package and
/// any scratch directories left by interrupted runs.
///
/// The dependency cache directory is removed too once empty. Missing files
/// are not an error. Callers must hold the cache lock, since a concurrent
/// run's scratch directories look exactly like leftovers.
///
/// # Errors
///
/// Returns an I/O error if an existing file or scratch tree cannot be
/// deleted or a cache directory cannot be read.
pub fn prune_cache(config: &BuildpackConfig) -> Result<CleanupSummary> {
    let mut summary = CleanupSummary::default();

    if let Some(bytes) = remove_file(&config.cached_archive_path())? {
        summary.record(bytes);
    }
    if config.cache_dir().is_dir() {
        sweep_scratch(
            config.cache_dir(),
            &[UNPACKED_SCRATCH_PREFIX, PACKAGES_SCRATCH_PREFIX],
            &mut summary,
        )?;
    }

    let deps_cache = config.deps_cache_dir();
    if !deps_cache.is_dir() {
        return Ok(summary);
    }
    sweep_scratch(&deps_cache, &[DEB_SCRATCH_PREFIX], &mut summary)?;
    for entry in deps_cache.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_file() && entry.file_name().ends_with(".deb") {
            if let Some(bytes) = remove_file(entry.path())? {
                summary.record(bytes);
            }
        }
    }
    match fs::remove_dir(&deps_cache) {
        Ok(()) => debug!("removed {deps_cache}"),
        Err(e) => debug!("kept {deps_cache}: {e}"),
    }

    Ok(summary)
}

/// Removes every directory directly under `dir` whose name starts with one
/// of `prefixes`.
fn sweep_scratch(
    dir: &Utf8Path,
    prefixes: &[&str],
    summary: &mut CleanupSummary,
) -> std::io::Result<()> {
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        let name = entry.file_name();
        if !entry.file_type()?.is_dir() || !prefixes.iter().any(|p| name.starts_with(p)) {
            continue;
        }
        let bytes = tree_size(entry.path());
        fs::remove_dir_all(entry.path())?;
        debug!("removed stale scratch {} ({bytes} bytes)", entry.path());
        summary.scratch_dirs += 1;
        summary.bytes_reclaimed += bytes;
    }
    Ok(())
}

/// Total size of the regular files under `root`; unreadable entries count
/// as zero.
fn tree_size(root: &Utf8Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Removes `path`, returning its size, or `None` if it did not exist.
fn remove_file(path: &Utf8Path) -> std::io::Result<Option<u64>> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    fs::remove_file(path)?;
    debug!("removed {path} ({size} bytes)");
    Ok(Some(size))
}
