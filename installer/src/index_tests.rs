//! Tests for package index parsing and resolution.

use super::*;
use crate::config::{DEFAULT_ARCH, DEFAULT_MIRROR};
use crate::test_utils::{StubFetcher, gzip, packages_index, pool_path};
use rstest::{fixture, rstest};

fn sources() -> Vec<IndexSource> {
    vec![
        IndexSource::new("jammy", "main"),
        IndexSource::new("jammy", "universe"),
        IndexSource::new("focal", "main"),
        IndexSource::new("focal", "universe"),
    ]
}

fn index_url(source: &IndexSource) -> String {
    source.url(DEFAULT_MIRROR, DEFAULT_ARCH)
}

#[fixture]
fn empty_indexes() -> StubFetcher {
    let mut fetcher = StubFetcher::new();
    for source in sources() {
        fetcher.insert(index_url(&source), packages_index(&[]));
    }
    fetcher
}

#[test]
fn parse_keeps_first_stanza_for_duplicates() {
    let index = PackageIndex::parse(concat!(
        "Package: libcups2\n",
        "Filename: pool/main/c/cups/libcups2_2.4_amd64.deb\n",
        "\n",
        "Package: libcups2\n",
        "Filename: pool/main/c/cups/libcups2_2.3_amd64.deb\n",
    ));
    assert_eq!(index.len(), 1);
    assert_eq!(
        index.filename_for("libcups2"),
        Some("pool/main/c/cups/libcups2_2.4_amd64.deb")
    );
}

#[test]
fn parse_ignores_continuation_lines_and_incomplete_stanzas() {
    let index = PackageIndex::parse(concat!(
        "Package: libsm6\n",
        "Description: X11 Session Management library\n",
        " Filename: pool/bogus.deb\n",
        "Filename: pool/main/libs/libsm/libsm6_1.2_amd64.deb\n",
        "\n",
        "Package: orphan\n",
        "Version: 1.0\n",
        "\n",
    ));
    assert_eq!(
        index.filename_for("libsm6"),
        Some("pool/main/libs/libsm/libsm6_1.2_amd64.deb")
    );
    assert_eq!(index.filename_for("orphan"), None);
}

#[test]
fn from_gzip_decodes_bodies() {
    let body = packages_index(&[("libice6", "pool/main/l/libice6.deb")]);
    let index = PackageIndex::from_gzip(&body).expect("valid gzip");
    assert_eq!(index.filename_for("libice6"), Some("pool/main/l/libice6.deb"));
}

#[test]
fn from_gzip_rejects_corrupt_bodies() {
    let mut body = gzip(b"Package: x\nFilename: y\n\n");
    body.truncate(6);
    assert!(PackageIndex::from_gzip(&body).is_err());
    assert!(PackageIndex::from_gzip(b"<html>").is_err());
}

#[rstest]
fn fallback_universe_package_takes_four_lookups_in_order(mut empty_indexes: StubFetcher) {
    let last = sources().pop().expect("four sources");
    let path = pool_path("universe", "libglu1-mesa");
    empty_indexes.insert(index_url(&last), packages_index(&[("libglu1-mesa", path.as_str())]));

    let mut resolver = IndexResolver::new(&empty_indexes, DEFAULT_MIRROR, DEFAULT_ARCH, sources());
    let resolution = resolver.resolve("libglu1-mesa");

    assert_eq!(
        resolution,
        Resolution::Found(PackageLocator {
            name: "libglu1-mesa".to_owned(),
            url: format!("{DEFAULT_MIRROR}/{path}"),
            source: last,
        })
    );
    let expected: Vec<String> = sources().iter().map(index_url).collect();
    assert_eq!(empty_indexes.calls(), expected);
}

#[rstest]
fn first_matching_index_wins(mut empty_indexes: StubFetcher) {
    let all = sources();
    empty_indexes.insert(
        index_url(&all[0]),
        packages_index(&[("libnss3", "pool/main/n/nss/libnss3_new.deb")]),
    );
    empty_indexes.insert(
        index_url(&all[2]),
        packages_index(&[("libnss3", "pool/main/n/nss/libnss3_old.deb")]),
    );

    let mut resolver = IndexResolver::new(&empty_indexes, DEFAULT_MIRROR, DEFAULT_ARCH, all.clone());
    let Resolution::Found(locator) = resolver.resolve("libnss3") else {
        panic!("libnss3 should resolve");
    };
    assert!(locator.url.ends_with("libnss3_new.deb"));
    assert_eq!(locator.source, all[0]);
    assert_eq!(empty_indexes.calls().len(), 1);
}

#[rstest]
fn indexes_are_fetched_once_per_resolver(empty_indexes: StubFetcher) {
    let mut resolver = IndexResolver::new(&empty_indexes, DEFAULT_MIRROR, DEFAULT_ARCH, sources());
    for package in ["libnss3", "libnspr4", "libcups2"] {
        assert!(matches!(resolver.resolve(package), Resolution::NotFound { .. }));
    }
    for source in sources() {
        assert_eq!(empty_indexes.call_count(&index_url(&source)), 1, "{source}");
    }
}

#[rstest]
fn unavailable_indexes_are_recorded_and_skipped(mut empty_indexes: StubFetcher) {
    let all = sources();
    empty_indexes.remove(&index_url(&all[0]));
    empty_indexes.insert(index_url(&all[1]), b"not gzip".to_vec());
    empty_indexes.insert(
        index_url(&all[2]),
        packages_index(&[("libxslt1.1", "pool/main/libx/libxslt/libxslt1.1.deb")]),
    );

    let mut resolver = IndexResolver::new(&empty_indexes, DEFAULT_MIRROR, DEFAULT_ARCH, all.clone());
    let Resolution::Found(locator) = resolver.resolve("libxslt1.1") else {
        panic!("libxslt1.1 should resolve from the fallback release");
    };
    assert_eq!(locator.source, all[2]);

    // A second lookup must not retry the broken indexes.
    let _ = resolver.resolve("libdbus-1-3");
    assert_eq!(empty_indexes.call_count(&index_url(&all[0])), 1);
    assert_eq!(empty_indexes.call_count(&index_url(&all[1])), 1);

    let unavailable: Vec<&IndexSource> = resolver.unavailable().iter().map(|u| &u.source).collect();
    assert_eq!(unavailable, vec![&all[0], &all[1]]);
}

#[rstest]
fn not_found_lists_every_searched_index(empty_indexes: StubFetcher) {
    let mut resolver = IndexResolver::new(&empty_indexes, DEFAULT_MIRROR, DEFAULT_ARCH, sources());
    assert_eq!(
        resolver.resolve("libdoesnotexist"),
        Resolution::NotFound { searched: sources() }
    );
    assert!(resolver.into_unavailable().is_empty());
}

#[test]
fn source_display_and_url_trim_mirror_slash() {
    let source = IndexSource::new("focal", "universe");
    assert_eq!(source.to_string(), "focal/universe");
    assert_eq!(
        source.url("http://mirror.example/ubuntu/", "amd64"),
        "http://mirror.example/ubuntu/dists/focal/universe/binary-amd64/Packages.gz"
    );
}
