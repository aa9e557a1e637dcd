//! Install receipt recording what a compile run put in place.
//!
//! The receipt lives inside the installation tree so it travels with the
//! slug, and lets a later run (or a person debugging one) see which release
//! and which dependency packages were installed without re-deriving it.

use crate::config::BuildpackConfig;
use crate::deps::{DependencyOutcome, DependencyReport};
use crate::error::{BuildpackError, Result};
use crate::install::InstallOutcome;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;

/// File name of the receipt inside the installation directory.
pub const RECEIPT_FILE_NAME: &str = ".buildpack-receipt.json";

/// Current receipt schema version.
pub const RECEIPT_SCHEMA_VERSION: u32 = 1;

/// What one compile run installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    /// Receipt schema version.
    pub schema_version: u32,
    /// Installed release.
    pub version: String,
    /// The distribution archive.
    pub archive: ArchiveRecord,
    /// Executable path relative to the installation directory.
    pub executable: Utf8PathBuf,
    /// One record per configured dependency package.
    pub dependencies: Vec<DependencyRecord>,
}

/// Provenance of the distribution archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    /// Archive file name.
    pub filename: String,
    /// Download URL.
    pub url: String,
    /// Lowercase hex SHA-256.
    pub sha256: String,
    /// Whether the archive was reused from the cache.
    pub from_cache: bool,
}

/// Outcome of one dependency package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// Package name.
    pub package: String,
    /// Outcome label: `installed`, `not-found`, `failed` or `skipped`.
    pub status: String,
    /// Resolved download URL, when the package was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Index that supplied the package, as `release/section`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl InstallReceipt {
    /// Builds the receipt for a finished run.
    #[must_use]
    pub fn new(
        config: &BuildpackConfig,
        install: &InstallOutcome,
        deps: &DependencyReport,
    ) -> Self {
        let install_dir = config.install_dir();
        let executable = install
            .executable
            .strip_prefix(&install_dir)
            .map_or_else(|_| install.executable.clone(), Utf8Path::to_path_buf);
        let dependencies = deps
            .results
            .iter()
            .map(|result| {
                let locator = match &result.outcome {
                    DependencyOutcome::Installed { locator, .. } => Some(locator),
                    _ => None,
                };
                DependencyRecord {
                    package: result.package.clone(),
                    status: result.outcome.label().to_owned(),
                    url: locator.map(|l| l.url.clone()),
                    source: locator.map(|l| l.source.to_string()),
                }
            })
            .collect();

        Self {
            schema_version: RECEIPT_SCHEMA_VERSION,
            version: config.version().to_owned(),
            archive: ArchiveRecord {
                filename: config.archive_filename(),
                url: config.archive_url(),
                sha256: install.archive_sha256.clone(),
                from_cache: install.from_cache,
            },
            executable,
            dependencies,
        }
    }

    /// Receipt location for `config`.
    #[must_use]
    pub fn path(config: &BuildpackConfig) -> Utf8PathBuf {
        config.install_dir().join(RECEIPT_FILE_NAME)
    }

    /// Writes the receipt as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BuildpackError::ReceiptFailed`] if serialisation or the
    /// write fails.
    pub fn write(&self, path: &Utf8Path) -> Result<()> {
        let failed = |reason: String| BuildpackError::ReceiptFailed {
            path: path.to_owned(),
            reason,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        std::fs::write(path, json + "\n").map_err(|e| failed(e.to_string()))
    }

    /// Reads a receipt written by [`InstallReceipt::write`].
    ///
    /// # Errors
    ///
    /// Returns [`BuildpackError::ReceiptFailed`] if the file cannot be read
    /// or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let failed = |reason: String| BuildpackError::ReceiptFailed {
            path: path.to_owned(),
            reason,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| failed(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| failed(e.to_string()))
    }
}

/// Computes the lowercase hex SHA-256 of the file at `path`.
///
/// # Errors
///
/// Returns any I/O error raised while reading the file.
pub fn compute_sha256(path: &Utf8Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
