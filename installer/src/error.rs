//! Error types for the buildpack compile step.
//!
//! Only required-step failures live here: each variant aborts the pipeline
//! and carries the diagnostic context printed before the non-zero exit.
//! Optional-step failures (a single dependency package) are reported through
//! [`crate::deps::DependencyOutcome`] instead.

use crate::archive::ExtractionError;
use crate::config::ConfigError;
use crate::fetch::FetchError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that abort the compile step.
#[derive(Debug, Error)]
pub enum BuildpackError {
    /// The configuration could not be loaded or is inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The distribution archive could not be downloaded.
    #[error("failed to download {url}")]
    ArchiveDownload {
        /// URL that was requested.
        url: String,
        /// The underlying fetch failure.
        #[source]
        source: FetchError,
    },

    /// The distribution archive is not a gzip tarball.
    #[error(
        "{path} is not a gzip archive (detected: {file_type})\nleading content: {preview}"
    )]
    ArchiveInvalid {
        /// Path of the rejected archive.
        path: Utf8PathBuf,
        /// Description of the detected file type.
        file_type: String,
        /// Printable preview of the leading bytes.
        preview: String,
    },

    /// The unpacked archive lacks the expected top-level directory.
    #[error("no directory matching {pattern} in {dir}\ncontents:\n{listing}")]
    TopLevelDirMissing {
        /// Directory that was searched.
        dir: Utf8PathBuf,
        /// Human-readable description of the expected name.
        pattern: String,
        /// Listing of the searched directory.
        listing: String,
    },

    /// The executable was not found among the unpacked packages.
    #[error("{name} not found under {dir}\ncontents:\n{listing}")]
    ExecutableNotFound {
        /// File name that was searched for.
        name: String,
        /// Directory that was searched.
        dir: Utf8PathBuf,
        /// Listing of the searched tree.
        listing: String,
    },

    /// The executable is missing from the installation tree after copying.
    #[error("executable missing after copy: {path}")]
    ExecutableMissingAfterCopy {
        /// Expected location of the executable.
        path: Utf8PathBuf,
    },

    /// An archive could not be unpacked.
    #[error("failed to unpack {archive}")]
    Extraction {
        /// Archive that failed to unpack.
        archive: Utf8PathBuf,
        /// The underlying extraction failure.
        #[source]
        source: ExtractionError,
    },

    /// Copying the installation tree failed.
    #[error("failed to copy {from} to {to}: {reason}")]
    CopyFailed {
        /// Source tree.
        from: Utf8PathBuf,
        /// Destination tree.
        to: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// Wrapper or profile script generation failed.
    #[error("wrapper script generation failed: {0}")]
    WrapperGeneration(String),

    /// The install receipt could not be written.
    #[error("failed to write install receipt {path}: {reason}")]
    ReceiptFailed {
        /// Receipt location.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// The cache directory lock could not be taken.
    #[error("failed to lock cache directory at {path}")]
    CacheLock {
        /// Lock file path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A path produced while walking a tree is not valid UTF-8.
    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the offending path.
        path: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`BuildpackError`].
pub type Result<T> = std::result::Result<T, BuildpackError>;
