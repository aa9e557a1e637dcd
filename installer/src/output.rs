//! User-facing output for the compile step.
//!
//! Build logs are read by people scanning a platform's deploy output, so
//! every line carries one of a few fixed prefixes: stage headers start with
//! `-----> `, details are indented seven spaces, and problems are flagged
//! with ` !     `. Developer diagnostics go through the `log` facade instead.

use crate::config::BuildpackConfig;
use std::fmt::Display;
use std::io::Write;

/// Prefix for stage headers.
pub const TOPIC_PREFIX: &str = "-----> ";
/// Prefix for detail lines.
pub const DETAIL_PREFIX: &str = "       ";
/// Prefix for every line of a warning or error block.
pub const ALERT_PREFIX: &str = " !     ";

/// Writes prefixed progress lines to an output stream.
///
/// Quiet mode suppresses everything except errors and explicitly requested
/// reports. Write failures are
/// ignored: losing a progress line must not fail the build.
///
/// # Example
///
/// ```
/// use libreoffice_buildpack::output::Reporter;
///
/// let mut out = Vec::new();
/// let mut reporter = Reporter::new(&mut out, false);
/// reporter.topic("Installing LibreOffice");
/// reporter.warning("package libcups2 not found");
///
/// let text = String::from_utf8(out).unwrap();
/// assert_eq!(
///     text,
///     "-----> Installing LibreOffice\n !     WARNING: package libcups2 not found\n"
/// );
/// ```
pub struct Reporter<'a> {
    out: &'a mut dyn Write,
    quiet: bool,
}

impl<'a> Reporter<'a> {
    /// Creates a reporter over `out`.
    pub fn new(out: &'a mut dyn Write, quiet: bool) -> Self {
        Self { out, quiet }
    }

    /// Whether non-error output is suppressed.
    #[must_use]
    pub const fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Writes a stage header.
    pub fn topic(&mut self, message: impl Display) {
        if !self.quiet {
            self.write_block(TOPIC_PREFIX, DETAIL_PREFIX, &message);
        }
    }

    /// Writes an indented detail line.
    pub fn detail(&mut self, message: impl Display) {
        if !self.quiet {
            self.write_block(DETAIL_PREFIX, DETAIL_PREFIX, &message);
        }
    }

    /// Writes a warning block.
    pub fn warning(&mut self, message: impl Display) {
        if !self.quiet {
            self.write_block(&format!("{ALERT_PREFIX}WARNING: "), ALERT_PREFIX, &message);
        }
    }

    /// Writes indented lines the user asked for explicitly, such as the
    /// dry-run plan. Never suppressed.
    pub fn report(&mut self, message: impl Display) {
        self.write_block(DETAIL_PREFIX, DETAIL_PREFIX, &message);
    }

    /// Writes an error block. Never suppressed.
    pub fn error(&mut self, message: impl Display) {
        self.write_block(&format!("{ALERT_PREFIX}ERROR: "), ALERT_PREFIX, &message);
    }

    fn write_block(&mut self, first: &str, rest: &str, message: &dyn Display) {
        let text = message.to_string();
        let mut lines = text.lines();
        let head = lines.next().unwrap_or_default();
        if writeln!(self.out, "{first}{head}").is_err() {
            return;
        }
        for line in lines {
            if writeln!(self.out, "{rest}{line}").is_err() {
                return;
            }
        }
    }
}

/// Renders an error followed by each of its sources.
///
/// ```
/// use libreoffice_buildpack::output::error_chain;
///
/// let inner = std::io::Error::other("connection reset");
/// let outer = libreoffice_buildpack::fetch::FetchError::Io(inner);
/// assert_eq!(
///     error_chain(&outer),
///     "I/O error writing download: connection reset\ncaused by: connection reset"
/// );
/// ```
#[must_use]
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str("\ncaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Configuration summary printed by `--dry-run`.
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// Resolved configuration.
    pub config: &'a BuildpackConfig,
    /// Whether quiet mode is enabled.
    pub quiet: bool,
}

impl DryRunInfo<'_> {
    /// Formats the summary for display.
    ///
    /// # Example
    ///
    /// ```
    /// use camino::Utf8PathBuf;
    /// use libreoffice_buildpack::config::BuildpackConfig;
    /// use libreoffice_buildpack::output::DryRunInfo;
    ///
    /// let config = BuildpackConfig::new(Utf8PathBuf::from("/app"), Utf8PathBuf::from("/cache"));
    /// let text = DryRunInfo { config: &config, quiet: false }.display_text();
    ///
    /// assert!(text.starts_with("Dry run"));
    /// assert!(text.contains("/app/libreoffice/program/soffice"));
    /// assert!(text.contains("jammy/main"));
    /// ```
    #[must_use]
    pub fn display_text(&self) -> String {
        let config = self.config;
        let mut lines = vec![
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Build directory: {}", config.build_dir()),
            format!("Cache directory: {}", config.cache_dir()),
            format!("Version: {}", config.version()),
            format!("Archive URL: {}", config.archive_url()),
            format!("Cached archive: {}", config.cached_archive_path()),
            format!("Install directory: {}", config.install_dir()),
            format!("Executable: {}", config.installed_executable()),
            format!("Dependency directory: {}", config.deps_dir()),
            format!("Quiet: {}", self.quiet),
            String::new(),
            "Package indexes (search order):".to_owned(),
        ];
        lines.extend(config.index_sources().iter().map(|source| {
            format!(
                "  - {source}: {}",
                source.url(config.mirror(), config.arch())
            )
        }));
        lines.push(String::new());
        lines.push("Packages:".to_owned());
        lines.extend(config.packages().iter().map(|p| format!("  - {p}")));
        lines.join("\n")
    }
}
