//! Immutable configuration for one compile run.
//!
//! [`BuildpackConfig`] is built once at startup from the CLI paths and the
//! compiled-in defaults, optionally overridden from a TOML file, and then
//! passed by reference to every stage. All derived locations (cache entries,
//! installation tree, index URLs) are computed from it rather than from
//! ambient state.

use crate::index::IndexSource;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

/// LibreOffice release installed when no override is given.
pub const DEFAULT_VERSION: &str = "7.6.7.2";

/// Base URL of the LibreOffice release archive.
pub const DEFAULT_DOWNLOAD_BASE: &str =
    "https://downloadarchive.documentfoundation.org/libreoffice/old";

/// Ubuntu mirror used to resolve shared-library packages.
pub const DEFAULT_MIRROR: &str = "http://archive.ubuntu.com/ubuntu";

/// Distribution releases searched for packages, newest first.
pub const DEFAULT_RELEASES: [&str; 2] = ["jammy", "focal"];

/// Repository sections searched within each release.
pub const DEFAULT_SECTIONS: [&str; 2] = ["main", "universe"];

/// Debian architecture of the package indexes.
pub const DEFAULT_ARCH: &str = "amd64";

/// Shared libraries LibreOffice needs that slim runtime images lack.
pub const DEFAULT_PACKAGES: &[&str] = &[
    "libnss3",
    "libnspr4",
    "libxinerama1",
    "libxrandr2",
    "libcups2",
    "libdbus-1-3",
    "libcairo2",
    "libsm6",
    "libice6",
    "libxslt1.1",
    "libglu1-mesa",
];

/// Directory under the build directory receiving the installation tree.
pub const INSTALL_DIR_NAME: &str = "libreoffice";

/// Directory under the build directory receiving the dependency tree.
pub const DEPS_DIR_NAME: &str = "libreoffice-deps";

/// File name of the LibreOffice executable.
pub const EXECUTABLE_NAME: &str = "soffice";

/// Errors raised while assembling the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The override file could not be read.
    #[error("failed to read config file {path}")]
    Read {
        /// Path of the override file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The override file is not valid TOML or has unknown keys.
    #[error("invalid config file {path}: {reason}")]
    Parse {
        /// Path of the override file.
        path: Utf8PathBuf,
        /// Description of the parse error.
        reason: String,
    },

    /// A value is present but unusable.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Name of the offending setting.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Optional overrides read from a TOML file.
///
/// Every key is optional; omitted keys keep the compiled-in defaults.
///
/// ```
/// use libreoffice_buildpack::config::ConfigOverrides;
///
/// let overrides = ConfigOverrides::parse("version = \"24.2.7.2\"").unwrap();
/// assert_eq!(overrides.version.as_deref(), Some("24.2.7.2"));
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    /// LibreOffice release, e.g. `7.6.7.2`.
    pub version: Option<String>,
    /// Base URL of the release archive.
    pub download_base: Option<String>,
    /// Package mirror root.
    pub mirror: Option<String>,
    /// Current and fallback distribution releases.
    pub releases: Option<Vec<String>>,
    /// Primary and secondary repository sections.
    pub sections: Option<Vec<String>>,
    /// Package index architecture.
    pub arch: Option<String>,
    /// Shared-library packages to fetch.
    pub packages: Option<Vec<String>>,
}

impl ConfigOverrides {
    /// Parses overrides from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error when the text is malformed or names an unknown
    /// key.
    pub fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Reads and parses an override file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }
}

/// Everything one compile run needs to know.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildpackConfig {
    build_dir: Utf8PathBuf,
    cache_dir: Utf8PathBuf,
    version: String,
    download_base: String,
    mirror: String,
    releases: [String; 2],
    sections: [String; 2],
    arch: String,
    packages: Vec<String>,
}

impl BuildpackConfig {
    /// Creates a configuration with the compiled-in defaults.
    #[must_use]
    pub fn new(build_dir: Utf8PathBuf, cache_dir: Utf8PathBuf) -> Self {
        Self {
            build_dir,
            cache_dir,
            version: DEFAULT_VERSION.to_owned(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_owned(),
            mirror: DEFAULT_MIRROR.to_owned(),
            releases: DEFAULT_RELEASES.map(str::to_owned),
            sections: DEFAULT_SECTIONS.map(str::to_owned),
            arch: DEFAULT_ARCH.to_owned(),
            packages: DEFAULT_PACKAGES.iter().map(|&p| p.to_owned()).collect(),
        }
    }

    /// Applies file overrides, validating each supplied value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a version is malformed, a list
    /// of releases or sections does not have exactly two entries, or a
    /// string value is blank.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(version) = overrides.version {
            self.version = validate_version(version)?;
        }
        if let Some(base) = overrides.download_base {
            self.download_base = non_blank("download_base", base)?;
        }
        if let Some(mirror) = overrides.mirror {
            self.mirror = non_blank("mirror", mirror)?;
        }
        if let Some(releases) = overrides.releases {
            self.releases = exactly_two("releases", releases)?;
        }
        if let Some(sections) = overrides.sections {
            self.sections = exactly_two("sections", sections)?;
        }
        if let Some(arch) = overrides.arch {
            self.arch = non_blank("arch", arch)?;
        }
        if let Some(packages) = overrides.packages {
            self.packages = packages
                .into_iter()
                .map(|p| non_blank("packages", p))
                .collect::<Result<_, _>>()?;
        }
        Ok(self)
    }

    /// Build directory receiving every durable output.
    #[must_use]
    pub fn build_dir(&self) -> &Utf8Path {
        &self.build_dir
    }

    /// Cache directory persisted between builds.
    #[must_use]
    pub fn cache_dir(&self) -> &Utf8Path {
        &self.cache_dir
    }

    /// LibreOffice release, e.g. `7.6.7.2`.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Package mirror root.
    #[must_use]
    pub fn mirror(&self) -> &str {
        &self.mirror
    }

    /// Package index architecture.
    #[must_use]
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Shared-library packages to fetch.
    #[must_use]
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// File name of the distribution archive.
    ///
    /// ```
    /// use camino::Utf8PathBuf;
    /// use libreoffice_buildpack::config::BuildpackConfig;
    ///
    /// let config = BuildpackConfig::new(Utf8PathBuf::from("/b"), Utf8PathBuf::from("/c"));
    /// assert_eq!(
    ///     config.archive_filename(),
    ///     "LibreOffice_7.6.7.2_Linux_x86-64_deb.tar.gz"
    /// );
    /// ```
    #[must_use]
    pub fn archive_filename(&self) -> String {
        format!("LibreOffice_{}_Linux_x86-64_deb.tar.gz", self.version)
    }

    /// Download URL of the distribution archive.
    #[must_use]
    pub fn archive_url(&self) -> String {
        format!(
            "{}/{}/deb/x86_64/{}",
            self.download_base.trim_end_matches('/'),
            self.version,
            self.archive_filename()
        )
    }

    /// Location of the cached distribution archive.
    #[must_use]
    pub fn cached_archive_path(&self) -> Utf8PathBuf {
        self.cache_dir.join(self.archive_filename())
    }

    /// Cache directory holding downloaded dependency packages.
    #[must_use]
    pub fn deps_cache_dir(&self) -> Utf8PathBuf {
        self.cache_dir.join("deps")
    }

    /// Installation tree inside the build directory.
    #[must_use]
    pub fn install_dir(&self) -> Utf8PathBuf {
        self.build_dir.join(INSTALL_DIR_NAME)
    }

    /// Shared dependency tree inside the build directory.
    #[must_use]
    pub fn deps_dir(&self) -> Utf8PathBuf {
        self.build_dir.join(DEPS_DIR_NAME)
    }

    /// Directory receiving the wrapper script and its alias.
    #[must_use]
    pub fn bin_dir(&self) -> Utf8PathBuf {
        self.build_dir.join("bin")
    }

    /// Directory the platform sources at session start.
    #[must_use]
    pub fn profile_dir(&self) -> Utf8PathBuf {
        self.build_dir.join(".profile.d")
    }

    /// Expected location of the executable once installed.
    #[must_use]
    pub fn installed_executable(&self) -> Utf8PathBuf {
        self.install_dir().join("program").join(EXECUTABLE_NAME)
    }

    /// Package indexes in search order: current release main and secondary
    /// sections, then the fallback release in the same section order.
    #[must_use]
    pub fn index_sources(&self) -> Vec<IndexSource> {
        self.releases
            .iter()
            .flat_map(|release| {
                self.sections
                    .iter()
                    .map(move |section| IndexSource::new(release, section))
            })
            .collect()
    }
}

fn validate_version(version: String) -> Result<String, ConfigError> {
    let is_valid = !version.is_empty()
        && !version.starts_with('.')
        && !version.ends_with('.')
        && !version.contains("..")
        && version.chars().all(|c| c.is_ascii_digit() || c == '.');
    if is_valid {
        Ok(version)
    } else {
        Err(ConfigError::Invalid {
            field: "version",
            reason: format!("expected dotted digits, got {version:?}"),
        })
    }
}

fn non_blank(field: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid {
            field,
            reason: "value must not be blank".to_owned(),
        });
    }
    Ok(trimmed.to_owned())
}

fn exactly_two(field: &'static str, values: Vec<String>) -> Result<[String; 2], ConfigError> {
    let count = values.len();
    let values = values
        .into_iter()
        .map(|v| non_blank(field, v))
        .collect::<Result<Vec<_>, _>>()?;
    <[String; 2]>::try_from(values).map_err(|_| ConfigError::Invalid {
        field,
        reason: format!("expected exactly two entries, got {count}"),
    })
}
