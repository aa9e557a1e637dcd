//! Shared-library dependency fetching.
//!
//! Each configured package is resolved against the package indexes,
//! downloaded into the cache (unless already cached) and its data payload
//! merged into the shared dependency tree. Nothing here is fatal: every
//! package yields a [`DependencyOutcome`] and the caller decides what to
//! report.

use crate::archive::ExtractionError;
use crate::archive::deb::extract_deb;
use crate::archive::file_type::{FileType, sniff_file};
use crate::config::BuildpackConfig;
use crate::fetch::Fetcher;
use crate::index::{IndexResolver, IndexSource, PackageLocator, Resolution, UnavailableIndex};
use crate::tree::copy_tree;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::fs;
use walkdir::WalkDir;

/// Prefix of the per-package scratch directories in the dependency cache.
pub const DEB_SCRATCH_PREFIX: &str = "deb-";

/// What happened to one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyOutcome {
    /// The package payload was merged into the dependency tree.
    Installed {
        /// Where the package came from.
        locator: PackageLocator,
        /// Whether the `.deb` was reused from the cache.
        from_cache: bool,
        /// Number of files the payload contained.
        files: usize,
    },
    /// No index lists the package.
    NotFound {
        /// Indexes consulted, in search order.
        searched: Vec<IndexSource>,
    },
    /// The package was found but could not be downloaded or unpacked.
    Failed {
        /// Description of the failure.
        reason: String,
    },
    /// The package uses a payload format that is not supported.
    Skipped {
        /// Description of the unsupported format.
        reason: String,
    },
}

impl DependencyOutcome {
    /// Short machine-friendly label for the outcome.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Installed { .. } => "installed",
            Self::NotFound { .. } => "not-found",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// One package and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyResult {
    /// Package name.
    pub package: String,
    /// What happened to it.
    pub outcome: DependencyOutcome,
}

impl DependencyResult {
    /// Warning text for outcomes the user should hear about.
    ///
    /// Installed packages and unsupported payload formats produce none.
    #[must_use]
    pub fn warning(&self) -> Option<String> {
        match &self.outcome {
            DependencyOutcome::NotFound { searched } => {
                let searched = searched
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                Some(format!(
                    "package {} not found (searched {searched}); continuing without it",
                    self.package
                ))
            }
            DependencyOutcome::Failed { reason } => Some(format!(
                "package {} could not be installed: {reason}; continuing without it",
                self.package
            )),
            DependencyOutcome::Installed { .. } | DependencyOutcome::Skipped { .. } => None,
        }
    }
}

/// Everything the dependency stage did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyReport {
    /// One result per configured package, in configuration order.
    pub results: Vec<DependencyResult>,
    /// Compatibility aliases created after all packages were merged.
    pub aliases: Vec<Utf8PathBuf>,
    /// Aliases that could not be created, with the reason.
    pub alias_failures: Vec<String>,
    /// Indexes that could not be fetched or decoded.
    pub unavailable_indexes: Vec<UnavailableIndex>,
}

impl DependencyReport {
    /// Number of packages installed.
    #[must_use]
    pub fn installed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, DependencyOutcome::Installed { .. }))
            .count()
    }

    /// Warning lines for every index that could not be used, every package
    /// that was not installed and every alias that could not be created.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        let index_warnings = self.unavailable_indexes.iter().map(|u| {
            format!("package index {} unavailable: {}", u.source, u.reason)
        });
        index_warnings
            .chain(self.results.iter().filter_map(DependencyResult::warning))
            .chain(self.alias_failures.iter().cloned())
            .collect()
    }
}

/// Fetches every configured package into the dependency tree.
///
/// Never fails: problems with a package are captured in its outcome, and
/// problems creating aliases in [`DependencyReport::alias_failures`].
pub fn fetch_dependencies(config: &BuildpackConfig, fetcher: &dyn Fetcher) -> DependencyReport {
    let mut resolver = IndexResolver::new(
        fetcher,
        config.mirror(),
        config.arch(),
        config.index_sources(),
    );
    let deps_dir = config.deps_dir();
    let cache_dir = config.deps_cache_dir();

    let results = config
        .packages()
        .iter()
        .map(|package| {
            let outcome = match resolver.resolve(package) {
                Resolution::Found(locator) => {
                    install_package(locator, fetcher, &cache_dir, &deps_dir)
                }
                Resolution::NotFound { searched } => DependencyOutcome::NotFound { searched },
            };
            debug!("dependency {package}: {}", outcome.label());
            DependencyResult {
                package: package.clone(),
                outcome,
            }
        })
        .collect();

    let aliases = if deps_dir.is_dir() {
        create_soname_aliases(&deps_dir)
    } else {
        SonameAliases::default()
    };

    DependencyReport {
        results,
        aliases: aliases.created,
        alias_failures: aliases.failed,
        unavailable_indexes: resolver.into_unavailable(),
    }
}

/// Downloads (or reuses) and merges one resolved package.
fn install_package(
    locator: PackageLocator,
    fetcher: &dyn Fetcher,
    cache_dir: &Utf8Path,
    deps_dir: &Utf8Path,
) -> DependencyOutcome {
    let deb_path = cache_dir.join(format!("{}.deb", locator.name));
    let from_cache = match ensure_cached(&locator, fetcher, cache_dir, &deb_path) {
        Ok(from_cache) => from_cache,
        Err(reason) => return DependencyOutcome::Failed { reason },
    };

    match merge_payload(&deb_path, cache_dir, deps_dir) {
        Ok(files) => DependencyOutcome::Installed {
            locator,
            from_cache,
            files,
        },
        Err(ExtractionError::UnsupportedCompression { member }) => {
            debug!("skipping {}: unsupported payload {member}", locator.name);
            DependencyOutcome::Skipped {
                reason: format!("unsupported payload {member}"),
            }
        }
        Err(e) => DependencyOutcome::Failed {
            reason: e.to_string(),
        },
    }
}

/// Makes sure a usable `.deb` sits at `deb_path`, returning whether it was
/// already cached.
///
/// A cached file that does not look like an `ar` archive is discarded and
/// fetched again; a freshly fetched one that does not is discarded and
/// reported.
fn ensure_cached(
    locator: &PackageLocator,
    fetcher: &dyn Fetcher,
    cache_dir: &Utf8Path,
    deb_path: &Utf8Path,
) -> Result<bool, String> {
    if deb_path.is_file() {
        if is_ar(deb_path) {
            debug!("reusing cached {deb_path}");
            return Ok(true);
        }
        warn!("discarding cached {deb_path}: not a Debian package");
        discard(deb_path);
    }

    fs::create_dir_all(cache_dir).map_err(|e| format!("creating {cache_dir}: {e}"))?;
    fetcher
        .fetch_to_file(&locator.url, deb_path.as_std_path())
        .map_err(|e| e.to_string())?;

    if is_ar(deb_path) {
        Ok(false)
    } else {
        let detected = sniff_file(deb_path.as_std_path())
            .map_or_else(|_| "unreadable".to_owned(), |s| s.file_type.to_string());
        discard(deb_path);
        Err(format!(
            "{} is not a Debian package (detected: {detected})",
            locator.url
        ))
    }
}

/// Unpacks into a scratch directory first so a failing package leaves the
/// dependency tree untouched.
fn merge_payload(
    deb_path: &Utf8Path,
    scratch_parent: &Utf8Path,
    deps_dir: &Utf8Path,
) -> Result<usize, ExtractionError> {
    let scratch = tempfile::Builder::new()
        .prefix(DEB_SCRATCH_PREFIX)
        .tempdir_in(scratch_parent)?;
    let files = extract_deb(deb_path.as_std_path(), scratch.path())?;
    let scratch_path = Utf8Path::from_path(scratch.path()).ok_or_else(|| {
        ExtractionError::Io(std::io::Error::other("scratch path is not valid UTF-8"))
    })?;
    copy_tree(scratch_path, deps_dir)
        .map_err(|e| ExtractionError::Io(std::io::Error::other(e.to_string())))?;
    Ok(files.len())
}

fn is_ar(path: &Utf8Path) -> bool {
    sniff_file(path.as_std_path()).is_ok_and(|s| s.file_type == FileType::Ar)
}

fn discard(path: &Utf8Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("failed to remove {path}: {e}");
    }
}

/// Returns the soname alias for a versioned shared-library file name.
///
/// `libfoo.so.1.2.3` maps to `libfoo.so.1`; names without at least a major
/// and minor numeric component after `.so.` map to `None`.
///
/// ```
/// use libreoffice_buildpack::deps::soname_alias;
///
/// assert_eq!(soname_alias("libxslt.so.1.1.34").as_deref(), Some("libxslt.so.1"));
/// assert_eq!(soname_alias("libxslt.so.1"), None);
/// assert_eq!(soname_alias("README"), None);
/// ```
#[must_use]
pub fn soname_alias(file_name: &str) -> Option<String> {
    if !file_name.starts_with("lib") {
        return None;
    }
    let (stem, version) = file_name.split_once(".so.")?;
    let parts: Vec<&str> = version.split('.').collect();
    let all_numeric = parts
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if parts.len() < 2 || !all_numeric {
        return None;
    }
    let major = parts.first()?;
    Some(format!("{stem}.so.{major}"))
}

/// Outcome of alias creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SonameAliases {
    /// Aliases created.
    pub created: Vec<Utf8PathBuf>,
    /// Description of each alias or entry that could not be handled.
    pub failed: Vec<String>,
}

/// Creates missing soname aliases for versioned libraries under `root`.
///
/// Each alias is a relative symlink in the library's own directory.
/// Failures are collected and the remaining aliases still created.
pub fn create_soname_aliases(root: &Utf8Path) -> SonameAliases {
    let mut aliases = SonameAliases::default();
    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                aliases
                    .failed
                    .push(format!("skipped unreadable entry under {root}: {e}"));
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some(alias) = soname_alias(name) {
            candidates.push((entry.path().to_path_buf(), name.to_owned(), alias));
        }
    }

    for (path, name, alias) in candidates {
        let Some(dir) = path.parent() else {
            continue;
        };
        let alias_path = dir.join(&alias);
        if fs::symlink_metadata(&alias_path).is_ok() {
            continue;
        }
        match link(&name, &alias_path) {
            Ok(()) => match Utf8PathBuf::from_path_buf(alias_path) {
                Ok(alias_path) => {
                    debug!("created alias {alias_path} -> {name}");
                    aliases.created.push(alias_path);
                }
                Err(p) => debug!("created alias {} -> {name}", p.display()),
            },
            Err(e) => aliases.failed.push(format!(
                "could not create library alias {}: {e}",
                alias_path.display()
            )),
        }
    }
    aliases
}

#[cfg(unix)]
fn link(target: &str, alias: &std::path::Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, alias)
}

#[cfg(not(unix))]
fn link(target: &str, alias: &std::path::Path) -> std::io::Result<()> {
    let source = alias.with_file_name(target);
    fs::copy(source, alias).map(|_| ())
}

#[cfg(test)]
#[path = "deps_tests.rs"]
mod tests;
