//! CLI argument definitions for the compile step.
//!
//! The hosting platform invokes `compile BUILD_DIR CACHE_DIR [ENV_DIR]`;
//! the options exist for people running the step by hand. Separated from
//! the entrypoint so parsing can be tested without running a build.

use crate::config::{BuildpackConfig, ConfigError, ConfigOverrides};
use camino::Utf8PathBuf;
use clap::Parser;

/// Install a headless LibreOffice into a build directory.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "compile")]
#[command(version, about)]
#[command(long_about = concat!(
    "Install a headless LibreOffice into a build directory.\n\n",
    "Downloads the LibreOffice Debian-package distribution and the shared ",
    "libraries it needs, unpacks them without a system package manager, and ",
    "writes a launcher at BUILD_DIR/bin/soffice plus a profile script that ",
    "puts it on PATH at runtime.\n\n",
    "Downloads are cached in CACHE_DIR and removed once installation succeeds.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Compile into an application directory:\n",
    "    $ compile /tmp/build /tmp/cache /tmp/env\n\n",
    "  Install a different release:\n",
    "    $ echo 'version = \"24.2.7.2\"' > buildpack.toml\n",
    "    $ compile --config buildpack.toml /tmp/build /tmp/cache\n\n",
    "  Preview without downloading anything:\n",
    "    $ compile --dry-run /tmp/build /tmp/cache",
))]
pub struct Cli {
    /// Build directory receiving the installation.
    #[arg(value_name = "BUILD_DIR")]
    pub build_dir: Utf8PathBuf,

    /// Cache directory persisted between builds.
    #[arg(value_name = "CACHE_DIR")]
    pub cache_dir: Utf8PathBuf,

    /// Environment directory supplied by the platform (unused).
    #[arg(value_name = "ENV_DIR")]
    pub env_dir: Option<Utf8PathBuf>,

    /// TOML file overriding the release, mirror, indexes or package list.
    #[arg(long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Show the resolved configuration and exit without side effects.
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Builds the run configuration, applying the override file if given.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the override file cannot be read or
    /// contains invalid values.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use libreoffice_buildpack::cli::Cli;
    ///
    /// let cli = Cli::parse_from(["compile", "/app", "/cache"]);
    /// let config = cli.to_config()?;
    /// assert_eq!(config.build_dir(), "/app");
    /// assert_eq!(config.version(), "7.6.7.2");
    /// # Ok::<(), libreoffice_buildpack::config::ConfigError>(())
    /// ```
    pub fn to_config(&self) -> Result<BuildpackConfig, ConfigError> {
        let config = BuildpackConfig::new(self.build_dir.clone(), self.cache_dir.clone());
        match &self.config {
            Some(path) => config.with_overrides(ConfigOverrides::load(path)?),
            None => Ok(config),
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
