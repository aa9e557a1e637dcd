//! Tests for shared-library dependency fetching.

use super::*;
use crate::config::ConfigOverrides;
use crate::test_utils::{
    PackageLayout, StubFetcher, build_deb, distribution_fetcher, library_payload, pool_path,
    utf8_tempdir,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Harness {
    _temp: TempDir,
    config: BuildpackConfig,
}

impl Harness {
    fn deb_url(&self, package: &str) -> String {
        format!("{}/{}", self.config.mirror(), pool_path("main", package))
    }

    fn library(&self, package: &str) -> Utf8PathBuf {
        self.config
            .deps_dir()
            .join(format!("usr/lib/x86_64-linux-gnu/{package}.so.1.0.0"))
    }
}

fn harness_with(packages: &[&str]) -> Harness {
    let (temp, root) = utf8_tempdir();
    let overrides = ConfigOverrides {
        packages: Some(packages.iter().map(|&p| p.to_owned()).collect()),
        ..ConfigOverrides::default()
    };
    let config = BuildpackConfig::new(root.join("build"), root.join("cache"))
        .with_overrides(overrides)
        .expect("valid overrides");
    Harness {
        _temp: temp,
        config,
    }
}

#[fixture]
fn harness() -> Harness {
    harness_with(&["libnss3", "libxslt1.1"])
}

fn outcome_of<'a>(report: &'a DependencyReport, package: &str) -> &'a DependencyOutcome {
    &report
        .results
        .iter()
        .find(|r| r.package == package)
        .expect("package result present")
        .outcome
}

#[rstest]
fn installs_every_listed_package(harness: Harness) {
    let fetcher = distribution_fetcher(&harness.config, PackageLayout::Nested);

    let report = fetch_dependencies(&harness.config, &fetcher);

    assert_eq!(report.installed_count(), 2);
    assert!(report.warnings().is_empty(), "{:?}", report.warnings());
    assert!(harness.library("libnss3").is_file());
    assert!(harness.library("libxslt1.1").is_file());
    assert!(
        matches!(
            outcome_of(&report, "libnss3"),
            DependencyOutcome::Installed { from_cache: false, files: 1, .. }
        ),
        "{report:?}"
    );
    assert!(harness.config.deps_cache_dir().join("libnss3.deb").is_file());
}

#[rstest]
fn creates_soname_aliases_after_merging(harness: Harness) {
    let fetcher = distribution_fetcher(&harness.config, PackageLayout::Nested);

    let report = fetch_dependencies(&harness.config, &fetcher);

    let lib_dir = harness.config.deps_dir().join("usr/lib/x86_64-linux-gnu");
    assert_eq!(
        report.aliases,
        vec![lib_dir.join("libnss3.so.1"), lib_dir.join("libxslt1.1.so.1")]
    );
    #[cfg(unix)]
    assert_eq!(
        fs::read_link(lib_dir.join("libnss3.so.1")).expect("alias is a link"),
        std::path::PathBuf::from("libnss3.so.1.0.0")
    );
}

#[test]
fn missing_package_warns_and_continues() {
    let harness = harness_with(&["libdoesnotexist", "libnss3"]);
    let published = harness_with(&["libnss3"]);
    let fetcher = distribution_fetcher(&published.config, PackageLayout::Nested);

    let report = fetch_dependencies(&harness.config, &fetcher);

    assert!(matches!(
        outcome_of(&report, "libdoesnotexist"),
        DependencyOutcome::NotFound { searched } if searched.len() == 4
    ));
    assert!(harness.library("libnss3").is_file());
    let warnings = report.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(
        warnings[0].contains("libdoesnotexist")
            && warnings[0].contains("jammy/main, jammy/universe, focal/main, focal/universe"),
        "{warnings:?}"
    );
}

#[rstest]
fn download_failure_is_reported_not_fatal(harness: Harness) {
    let mut fetcher = distribution_fetcher(&harness.config, PackageLayout::Nested);
    fetcher.remove(&harness.deb_url("libnss3"));

    let report = fetch_dependencies(&harness.config, &fetcher);

    assert!(matches!(
        outcome_of(&report, "libnss3"),
        DependencyOutcome::Failed { reason } if reason.contains("not found")
    ));
    assert!(!harness.library("libnss3").exists());
    assert!(harness.library("libxslt1.1").is_file());
    assert!(!harness.config.deps_cache_dir().join("libnss3.deb").exists());
}

#[rstest]
fn html_error_page_is_discarded(harness: Harness) {
    let mut fetcher = distribution_fetcher(&harness.config, PackageLayout::Nested);
    fetcher.insert(
        harness.deb_url("libnss3"),
        b"<!DOCTYPE html><html>502 Bad Gateway</html>".to_vec(),
    );

    let report = fetch_dependencies(&harness.config, &fetcher);

    assert!(matches!(
        outcome_of(&report, "libnss3"),
        DependencyOutcome::Failed { reason } if reason.contains("HTML")
    ));
    assert!(!harness.config.deps_cache_dir().join("libnss3.deb").exists());
}

#[rstest]
fn cached_package_is_not_fetched_again(harness: Harness) {
    let cache = harness.config.deps_cache_dir();
    fs::create_dir_all(&cache).expect("cache dir");
    fs::write(
        cache.join("libnss3.deb"),
        build_deb("data.tar.gz", &library_payload("libnss3")),
    )
    .expect("seed cache");
    let fetcher = distribution_fetcher(&harness.config, PackageLayout::Nested);

    let report = fetch_dependencies(&harness.config, &fetcher);

    assert!(matches!(
        outcome_of(&report, "libnss3"),
        DependencyOutcome::Installed { from_cache: true, .. }
    ));
    assert_eq!(fetcher.call_count(&harness.deb_url("libnss3")), 0);
    assert!(harness.library("libnss3").is_file());
}

#[rstest]
fn corrupt_cached_package_is_refetched(harness: Harness) {
    let cache = harness.config.deps_cache_dir();
    fs::create_dir_all(&cache).expect("cache dir");
    fs::write(cache.join("libnss3.deb"), b"truncated").expect("seed cache");
    let fetcher = distribution_fetcher(&harness.config, PackageLayout::Nested);

    let report = fetch_dependencies(&harness.config, &fetcher);

    assert!(matches!(
        outcome_of(&report, "libnss3"),
        DependencyOutcome::Installed { from_cache: false, .. }
    ));
    assert_eq!(fetcher.call_count(&harness.deb_url("libnss3")), 1);
}

#[rstest]
fn unsupported_payload_is_skipped_silently(harness: Harness) {
    let mut fetcher = distribution_fetcher(&harness.config, PackageLayout::Nested);
    fetcher.insert(harness.deb_url("libnss3"), build_deb("data.tar.bz2", b"BZh9"));

    let report = fetch_dependencies(&harness.config, &fetcher);

    assert!(matches!(
        outcome_of(&report, "libnss3"),
        DependencyOutcome::Skipped { .. }
    ));
    assert!(report.warnings().is_empty());
}

#[rstest]
fn broken_payload_leaves_tree_unchanged(harness: Harness) {
    // A valid first entry followed by a header with a bad checksum: the
    // library is unpacked before the failure is noticed.
    let mut payload = library_payload("libnss3");
    payload.truncate(payload.len() - 1024);
    payload.extend_from_slice(&[0xab; 512]);
    let mut fetcher = distribution_fetcher(&harness.config, PackageLayout::Nested);
    fetcher.insert(harness.deb_url("libnss3"), build_deb("data.tar.xz", &payload));

    let report = fetch_dependencies(&harness.config, &fetcher);

    assert!(matches!(
        outcome_of(&report, "libnss3"),
        DependencyOutcome::Failed { .. }
    ));
    assert!(!harness.library("libnss3").exists());
    assert!(harness.library("libxslt1.1").is_file());
}

#[test]
fn unavailable_indexes_surface_as_warnings() {
    let harness = harness_with(&["libnss3"]);
    let mut fetcher = distribution_fetcher(&harness.config, PackageLayout::Nested);
    let sources = harness.config.index_sources();
    fetcher.remove(&sources[3].url(harness.config.mirror(), harness.config.arch()));
    let fetcher_without_packages = StubFetcher::new();

    let report = fetch_dependencies(&harness.config, &fetcher);
    assert!(report.unavailable_indexes.is_empty(), "first index matched");

    let report = fetch_dependencies(&harness.config, &fetcher_without_packages);
    assert_eq!(report.unavailable_indexes.len(), 4);
    let warnings = report.warnings();
    assert_eq!(warnings.len(), 5, "{warnings:?}");
    assert!(warnings[0].starts_with("package index jammy/main unavailable"));
}

#[rstest]
#[case::non_numeric("libnss3.so.0d.1.2", None)]
#[case::versioned("libxslt.so.1.1.34", Some("libxslt.so.1"))]
#[case::two_part("libICE.so.6.3", Some("libICE.so.6"))]
#[case::already_major("libcups.so.2", None)]
#[case::unversioned("libmergedlo.so", None)]
#[case::not_a_library("soffice.so.1.2", None)]
#[case::trailing_dot("libfoo.so.1.", None)]
fn soname_aliases_follow_major_version(#[case] name: &str, #[case] expected: Option<&str>) {
    assert_eq!(soname_alias(name).as_deref(), expected);
}

#[cfg(unix)]
#[test]
fn existing_aliases_are_left_alone() {
    let (_temp, root) = utf8_tempdir();
    let lib = root.join("usr/lib");
    fs::create_dir_all(&lib).expect("mkdir");
    fs::write(lib.join("libcairo.so.2.11600.0"), b"new").expect("write");
    fs::write(lib.join("libcairo.so.2"), b"shipped").expect("write");
    fs::write(lib.join("libSM.so.6.0.1"), b"sm").expect("write");

    let aliases = create_soname_aliases(&root);

    assert_eq!(aliases.created, vec![lib.join("libSM.so.6")]);
    assert!(aliases.failed.is_empty());
    assert_eq!(fs::read(lib.join("libcairo.so.2")).expect("read"), b"shipped");
}

#[cfg(unix)]
#[test]
fn alias_failures_become_warnings() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp, root) = utf8_tempdir();
    let lib = root.join("usr/lib");
    fs::create_dir_all(&lib).expect("mkdir");
    fs::write(lib.join("libSM.so.6.0.1"), b"sm").expect("write");
    fs::set_permissions(&lib, fs::Permissions::from_mode(0o555)).expect("read-only");
    let canary = lib.join("writable");
    let writable = fs::write(&canary, b"").is_ok();
    if writable {
        // Running with privileges that ignore directory permissions.
        fs::remove_file(&canary).expect("cleanup");
        fs::set_permissions(&lib, fs::Permissions::from_mode(0o755)).expect("restore");
        return;
    }

    let aliases = create_soname_aliases(&root);
    fs::set_permissions(&lib, fs::Permissions::from_mode(0o755)).expect("restore");

    assert!(aliases.created.is_empty());
    assert_eq!(aliases.failed.len(), 1);
    assert!(aliases.failed[0].contains("libSM.so.6"), "{:?}", aliases.failed);

    let report = DependencyReport {
        alias_failures: aliases.failed,
        ..DependencyReport::default()
    };
    assert!(report.warnings()[0].starts_with("could not create library alias"));
}
