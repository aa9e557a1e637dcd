//! Advisory lock on the cache directory.
//!
//! Two builds sharing one cache directory would otherwise race on the
//! archive, the dependency packages and the cleanup that deletes them.

use crate::error::{BuildpackError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use log::debug;
use std::fs::{self, File, OpenOptions};

/// Name of the lock file inside the cache directory.
pub const LOCK_FILE_NAME: &str = ".buildpack.lock";

/// An exclusive lock held until dropped.
///
/// The lock file itself is never removed: unlinking a file another process
/// is waiting on would let a third process lock a fresh inode at the same
/// path.
#[derive(Debug)]
pub struct CacheLock {
    _file: File,
    path: Utf8PathBuf,
}

impl CacheLock {
    /// Blocks until the lock on `cache_dir` is acquired.
    ///
    /// # Errors
    ///
    /// Returns [`BuildpackError::CacheLock`] if the lock file cannot be
    /// created or locked.
    pub fn acquire(cache_dir: &Utf8Path) -> Result<Self> {
        let path = cache_dir.join(LOCK_FILE_NAME);
        let lock_error = |source| BuildpackError::CacheLock {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(cache_dir).map_err(lock_error)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_error)?;
        file.lock_exclusive().map_err(lock_error)?;
        debug!("locked {path}");

        Ok(Self { _file: file, path })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}
