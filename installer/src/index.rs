//! Debian package index parsing and package resolution.
//!
//! A `Packages` index is a sequence of blank-line separated stanzas. Only the
//! `Package` and `Filename` fields matter here: the first stanza naming a
//! package wins, with no version comparison.

use crate::fetch::Fetcher;
use flate2::read::GzDecoder;
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;

/// One repository index: a release and a section within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexSource {
    /// Distribution release, e.g. `jammy`.
    pub release: String,
    /// Repository section, e.g. `universe`.
    pub section: String,
}

impl IndexSource {
    /// Creates a source for `release`/`section`.
    #[must_use]
    pub fn new(release: &str, section: &str) -> Self {
        Self {
            release: release.to_owned(),
            section: section.to_owned(),
        }
    }

    /// URL of this source's compressed `Packages` index.
    ///
    /// ```
    /// use libreoffice_buildpack::index::IndexSource;
    ///
    /// let source = IndexSource::new("jammy", "main");
    /// assert_eq!(
    ///     source.url("http://archive.ubuntu.com/ubuntu", "amd64"),
    ///     "http://archive.ubuntu.com/ubuntu/dists/jammy/main/binary-amd64/Packages.gz"
    /// );
    /// ```
    #[must_use]
    pub fn url(&self, mirror: &str, arch: &str) -> String {
        format!(
            "{}/dists/{}/{}/binary-{arch}/Packages.gz",
            mirror.trim_end_matches('/'),
            self.release,
            self.section
        )
    }
}

impl fmt::Display for IndexSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.release, self.section)
    }
}

/// Errors decoding a fetched index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The gzip stream is corrupt.
    #[error("failed to decompress package index: {0}")]
    Decompress(#[from] std::io::Error),
}

/// Parsed package index mapping package names to pool paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIndex {
    filenames: HashMap<String, String>,
}

impl PackageIndex {
    /// Parses uncompressed index text.
    ///
    /// ```
    /// use libreoffice_buildpack::index::PackageIndex;
    ///
    /// let index = PackageIndex::parse(
    ///     "Package: libnss3\nVersion: 2:3.68\nFilename: pool/main/n/nss/libnss3_3.68_amd64.deb\n\n",
    /// );
    /// assert_eq!(
    ///     index.filename_for("libnss3"),
    ///     Some("pool/main/n/nss/libnss3_3.68_amd64.deb")
    /// );
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut filenames = HashMap::new();
        let mut package: Option<&str> = None;
        let mut filename: Option<&str> = None;

        for line in text.lines().chain(std::iter::once("")) {
            if line.trim().is_empty() {
                if let (Some(name), Some(path)) = (package.take(), filename.take()) {
                    filenames
                        .entry(name.to_owned())
                        .or_insert_with(|| path.to_owned());
                }
                package = None;
                filename = None;
                continue;
            }
            if line.starts_with([' ', '\t']) {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                match key {
                    "Package" => package = Some(value.trim()),
                    "Filename" => filename = Some(value.trim()),
                    _ => {}
                }
            }
        }

        Self { filenames }
    }

    /// Decompresses and parses a `Packages.gz` body.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Decompress`] when the body is not valid gzip.
    pub fn from_gzip(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut raw = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut raw)?;
        Ok(Self::parse(&String::from_utf8_lossy(&raw)))
    }

    /// Pool path of `package`, if indexed.
    #[must_use]
    pub fn filename_for(&self, package: &str) -> Option<&str> {
        self.filenames.get(package).map(String::as_str)
    }

    /// Number of packages indexed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    /// Whether the index holds no packages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }
}

/// A resolved download location for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLocator {
    /// Package name.
    pub name: String,
    /// Download URL of the `.deb`.
    pub url: String,
    /// Index that supplied the match.
    pub source: IndexSource,
}

/// The result of resolving one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The package was found.
    Found(PackageLocator),
    /// No index lists the package.
    NotFound {
        /// Indexes consulted, in search order.
        searched: Vec<IndexSource>,
    },
}

/// An index that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailableIndex {
    /// The index source.
    pub source: IndexSource,
    /// Why it could not be used.
    pub reason: String,
}

/// Resolves package names against an ordered list of indexes.
///
/// Each index is fetched at most once per resolver; an index that fails to
/// download or decode is remembered as unavailable and treated as listing
/// nothing.
pub struct IndexResolver<'a> {
    fetcher: &'a dyn Fetcher,
    mirror: String,
    arch: String,
    sources: Vec<IndexSource>,
    loaded: HashMap<IndexSource, Option<PackageIndex>>,
    unavailable: Vec<UnavailableIndex>,
}

impl<'a> IndexResolver<'a> {
    /// Creates a resolver searching `sources` in order.
    #[must_use]
    pub fn new(fetcher: &'a dyn Fetcher, mirror: &str, arch: &str, sources: Vec<IndexSource>) -> Self {
        Self {
            fetcher,
            mirror: mirror.to_owned(),
            arch: arch.to_owned(),
            sources,
            loaded: HashMap::new(),
            unavailable: Vec::new(),
        }
    }

    /// Resolves `package`; the first index listing it wins.
    pub fn resolve(&mut self, package: &str) -> Resolution {
        let sources = self.sources.clone();
        for source in &sources {
            let found = self
                .index_for(source)
                .and_then(|index| index.filename_for(package))
                .map(str::to_owned);
            let Some(path) = found else {
                continue;
            };
            let url = format!(
                "{}/{}",
                self.mirror.trim_end_matches('/'),
                path.trim_start_matches('/')
            );
            debug!("resolved {package} in {source}: {url}");
            return Resolution::Found(PackageLocator {
                name: package.to_owned(),
                url,
                source: source.clone(),
            });
        }
        Resolution::NotFound { searched: sources }
    }

    /// Indexes that could not be fetched or decoded so far.
    #[must_use]
    pub fn unavailable(&self) -> &[UnavailableIndex] {
        &self.unavailable
    }

    /// Consumes the resolver, returning the unavailable indexes.
    #[must_use]
    pub fn into_unavailable(self) -> Vec<UnavailableIndex> {
        self.unavailable
    }

    fn index_for(&mut self, source: &IndexSource) -> Option<&PackageIndex> {
        if !self.loaded.contains_key(source) {
            let loaded = self.load(source);
            self.loaded.insert(source.clone(), loaded);
        }
        self.loaded.get(source).and_then(Option::as_ref)
    }

    fn load(&mut self, source: &IndexSource) -> Option<PackageIndex> {
        let url = source.url(&self.mirror, &self.arch);
        let decoded = self
            .fetcher
            .fetch_bytes(&url)
            .map_err(|e| e.to_string())
            .and_then(|bytes| PackageIndex::from_gzip(&bytes).map_err(|e| e.to_string()));
        match decoded {
            Ok(index) => {
                debug!("loaded {} packages from {url}", index.len());
                Some(index)
            }
            Err(reason) => {
                warn!("package index {source} unavailable: {reason}");
                self.unavailable.push(UnavailableIndex {
                    source: source.clone(),
                    reason,
                });
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
