//! Compile pipeline orchestration.
//!
//! Runs the stages in order under the cache lock: dependency fetching,
//! archive installation, wrapper generation, receipt writing and cache
//! pruning. Dependency problems and cleanup failures are reported as
//! warnings; every other failure aborts the run.

use crate::cleanup::{CleanupSummary, prune_cache};
use crate::config::BuildpackConfig;
use crate::deps::{DependencyOutcome, DependencyReport, fetch_dependencies};
use crate::error::Result;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::install::{InstallOutcome, install_archive};
use crate::lock::CacheLock;
use crate::output::Reporter;
use crate::receipt::InstallReceipt;
use crate::wrapper::{WrapperResult, generate_wrapper_scripts};
use camino::Utf8PathBuf;
use log::debug;

/// Everything a successful run produced.
#[derive(Debug)]
pub struct PipelineSummary {
    /// Outcome of every dependency package.
    pub dependencies: DependencyReport,
    /// The installed distribution.
    pub install: InstallOutcome,
    /// Generated scripts.
    pub wrappers: WrapperResult,
    /// Location of the install receipt.
    pub receipt_path: Utf8PathBuf,
    /// What cache pruning removed, or `None` if it failed.
    pub cleanup: Option<CleanupSummary>,
}

/// Runs the pipeline against the network.
///
/// # Errors
///
/// As for [`run_pipeline_with`].
pub fn run_pipeline(config: &BuildpackConfig, reporter: &mut Reporter<'_>) -> Result<PipelineSummary> {
    run_pipeline_with(config, &HttpFetcher, reporter)
}

/// Runs the pipeline with an injected fetcher.
///
/// # Errors
///
/// Returns an error if the build or cache directory cannot be prepared, the
/// cache lock cannot be taken, or installation, wrapper generation or the
/// receipt write fails.
pub fn run_pipeline_with(
    config: &BuildpackConfig,
    fetcher: &dyn Fetcher,
    reporter: &mut Reporter<'_>,
) -> Result<PipelineSummary> {
    std::fs::create_dir_all(config.build_dir())?;
    let lock = CacheLock::acquire(config.cache_dir())?;
    debug!("holding {}", lock.path());

    reporter.topic("Fetching shared library dependencies");
    let dependencies = fetch_dependencies(config, fetcher);
    report_dependencies(&dependencies, reporter);

    reporter.topic(format!("Installing LibreOffice {}", config.version()));
    let install = install_archive(config, fetcher, reporter)?;

    reporter.topic("Writing launch scripts");
    let wrappers = generate_wrapper_scripts(config)?;
    reporter.detail(format!("Launcher: {}", wrappers.wrapper_path));
    reporter.detail(format!("Profile: {}", wrappers.profile_path));

    let receipt_path = InstallReceipt::path(config);
    InstallReceipt::new(config, &install, &dependencies).write(&receipt_path)?;
    debug!("wrote {receipt_path}");

    reporter.topic("Cleaning up cache");
    let cleanup = match prune_cache(config) {
        Ok(summary) => {
            if summary.scratch_dirs > 0 {
                reporter.detail(format!(
                    "Removed {} stale scratch directories",
                    summary.scratch_dirs
                ));
            }
            reporter.detail(format!(
                "Removed {} files ({} bytes)",
                summary.removed, summary.bytes_reclaimed
            ));
            Some(summary)
        }
        Err(e) => {
            reporter.warning(format!("cache cleanup failed: {e}"));
            None
        }
    };

    reporter.topic(format!("LibreOffice installed at {}", install.executable));

    Ok(PipelineSummary {
        dependencies,
        install,
        wrappers,
        receipt_path,
        cleanup,
    })
}

fn report_dependencies(report: &DependencyReport, reporter: &mut Reporter<'_>) {
    for result in &report.results {
        match &result.outcome {
            DependencyOutcome::Installed {
                locator,
                from_cache,
                ..
            } => {
                let origin = if *from_cache { "cache" } else { "download" };
                reporter.detail(format!(
                    "{} from {} ({origin})",
                    result.package, locator.source
                ));
            }
            DependencyOutcome::Skipped { reason } => {
                debug!("{} skipped: {reason}", result.package);
            }
            DependencyOutcome::NotFound { .. } | DependencyOutcome::Failed { .. } => {}
        }
    }
    for warning in report.warnings() {
        reporter.warning(warning);
    }
    if !report.aliases.is_empty() {
        reporter.detail(format!("Created {} library aliases", report.aliases.len()));
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
