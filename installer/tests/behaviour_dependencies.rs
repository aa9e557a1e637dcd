//! BDD tests for fetching shared library dependencies from package indexes.

use libreoffice_buildpack::config::{BuildpackConfig, ConfigOverrides};
use libreoffice_buildpack::deps::{DependencyOutcome, DependencyReport, fetch_dependencies};
use libreoffice_buildpack::test_utils::{
    StubFetcher, build_deb, library_payload, packages_index, pool_path, utf8_tempdir,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

struct DependencyWorld {
    _temp_dir: TempDir,
    config: BuildpackConfig,
    fetcher: StubFetcher,
    report: Option<DependencyReport>,
}

impl DependencyWorld {
    fn report(&self) -> &DependencyReport {
        self.report.as_ref().expect("dependencies not fetched")
    }
}

#[fixture]
fn world() -> DependencyWorld {
    let (temp_dir, root) = utf8_tempdir();
    DependencyWorld {
        _temp_dir: temp_dir,
        config: BuildpackConfig::new(root.join("build"), root.join("cache")),
        fetcher: StubFetcher::new(),
        report: None,
    }
}

#[given("the package list \"{packages}\"")]
fn given_package_list(world: &mut DependencyWorld, packages: String) {
    let overrides = ConfigOverrides {
        packages: Some(packages.split(',').map(str::to_owned).collect()),
        ..ConfigOverrides::default()
    };
    world.config = world
        .config
        .clone()
        .with_overrides(overrides)
        .expect("valid package list");
}

#[given("package \"{package}\" is listed only in \"{source}\"")]
fn given_package_listed_in(world: &mut DependencyWorld, package: String, source: String) {
    let config = &world.config;
    for index in config.index_sources() {
        let url = index.url(config.mirror(), config.arch());
        if index.to_string() == source {
            let path = pool_path(&index.section, &package);
            world.fetcher.insert(
                format!("{}/{path}", config.mirror()),
                build_deb("data.tar.xz", &library_payload(&package)),
            );
            world
                .fetcher
                .insert(url, packages_index(&[(package.as_str(), path.as_str())]));
        } else {
            world.fetcher.insert(url, packages_index(&[]));
        }
    }
}

#[given("no package index is reachable")]
fn given_no_index_reachable(world: &mut DependencyWorld) {
    world.fetcher = StubFetcher::new();
}

#[when("dependencies are fetched")]
fn when_dependencies_fetched(world: &mut DependencyWorld) {
    world.report = Some(fetch_dependencies(&world.config, &world.fetcher));
}

#[then("the package indexes were requested in search order")]
fn then_indexes_in_order(world: &mut DependencyWorld) {
    let config = &world.config;
    let expected: Vec<String> = config
        .index_sources()
        .iter()
        .map(|s| s.url(config.mirror(), config.arch()))
        .collect();
    let requested: Vec<String> = world
        .fetcher
        .calls()
        .into_iter()
        .filter(|url| url.ends_with("Packages.gz"))
        .collect();
    assert_eq!(requested, expected);
}

#[then("package \"{package}\" is installed from \"{source}\"")]
fn then_package_installed_from(world: &mut DependencyWorld, package: String, source: String) {
    let result = world
        .report()
        .results
        .iter()
        .find(|r| r.package == package)
        .expect("package has a result");
    match &result.outcome {
        DependencyOutcome::Installed { locator, .. } => {
            assert_eq!(locator.source.to_string(), source);
        }
        other => panic!("expected {package} installed, got {other:?}"),
    }
    let library = world
        .config
        .deps_dir()
        .join(format!("usr/lib/x86_64-linux-gnu/{package}.so.1.0.0"));
    assert!(library.is_file(), "missing {library}");
}

#[then("the alias \"{alias}\" exists in the dependency tree")]
fn then_alias_exists(world: &mut DependencyWorld, alias: String) {
    let path = world
        .config
        .deps_dir()
        .join("usr/lib/x86_64-linux-gnu")
        .join(alias);
    assert!(path.symlink_metadata().is_ok(), "missing alias {path}");
    assert!(path.is_file(), "alias {path} does not resolve");
}

#[then("a warning mentions \"{text}\"")]
fn then_warning_mentions(world: &mut DependencyWorld, text: String) {
    let warnings = world.report().warnings();
    assert!(
        warnings.iter().any(|w| w.contains(&text)),
        "no warning containing {text:?} in {warnings:?}"
    );
}

#[then("no package is installed")]
fn then_nothing_installed(world: &mut DependencyWorld) {
    assert_eq!(world.report().installed_count(), 0);
}

#[then("the number of unavailable package indexes is {count}")]
fn then_indexes_unavailable(world: &mut DependencyWorld, count: usize) {
    assert_eq!(world.report().unavailable_indexes.len(), count);
}

#[scenario(
    path = "tests/features/dependencies.feature",
    name = "Package found only in the fallback release's secondary section"
)]
fn scenario_fallback_lookup(world: DependencyWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/dependencies.feature",
    name = "Missing package is reported and skipped"
)]
fn scenario_missing_package(world: DependencyWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/dependencies.feature",
    name = "Unreachable mirror does not abort the stage"
)]
fn scenario_unreachable_mirror(world: DependencyWorld) {
    let _ = world;
}
