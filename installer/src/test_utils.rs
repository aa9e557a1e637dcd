//! Shared test utilities for the buildpack crate.
//!
//! Builders here produce real archives (tar, gzip, xz, zstd, `ar`) so that
//! extraction code runs against the same formats it meets in production,
//! and [`StubFetcher`] serves them from memory while recording every URL
//! requested.

use crate::config::BuildpackConfig;
use crate::fetch::{FetchError, Fetcher};
use camino::Utf8PathBuf;
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// A [`Fetcher`] serving canned bodies keyed by URL.
///
/// Unknown URLs yield [`FetchError::NotFound`]. Every request, successful or
/// not, is recorded in order.
#[derive(Debug, Default)]
pub struct StubFetcher {
    responses: HashMap<String, Vec<u8>>,
    calls: RefCell<Vec<String>>,
}

impl StubFetcher {
    /// Creates a stub with no responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `body` as the response for `url`.
    #[must_use]
    pub fn with_response(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.insert(url, body);
        self
    }

    /// Registers `body` as the response for `url`, replacing any previous one.
    pub fn insert(&mut self, url: impl Into<String>, body: Vec<u8>) {
        self.responses.insert(url.into(), body);
    }

    /// Removes the response for `url`, so later requests see a 404.
    pub fn remove(&mut self, url: &str) {
        self.responses.remove(url);
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Number of requests made for `url`.
    #[must_use]
    pub fn call_count(&self, url: &str) -> usize {
        self.calls.borrow().iter().filter(|c| *c == url).count()
    }

    /// Forgets recorded requests.
    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn respond(&self, url: &str) -> Result<&[u8], FetchError> {
        self.calls.borrow_mut().push(url.to_owned());
        self.responses
            .get(url)
            .map(Vec::as_slice)
            .ok_or_else(|| FetchError::NotFound {
                url: url.to_owned(),
            })
    }
}

impl Fetcher for StubFetcher {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.respond(url).map(<[u8]>::to_vec)
    }

    fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let body = self.respond(url)?;
        std::fs::write(dest, body)?;
        Ok(body.len() as u64)
    }
}

/// One entry of a tar archive under construction.
#[derive(Debug, Clone)]
pub struct TarEntry {
    path: String,
    kind: TarEntryKind,
}

#[derive(Debug, Clone)]
enum TarEntryKind {
    File { contents: Vec<u8>, mode: u32 },
    Dir,
    Symlink { target: String },
}

impl TarEntry {
    /// A regular file with mode 0644.
    #[must_use]
    pub fn file(path: &str, contents: &[u8]) -> Self {
        Self {
            path: path.to_owned(),
            kind: TarEntryKind::File {
                contents: contents.to_vec(),
                mode: 0o644,
            },
        }
    }

    /// A regular file with mode 0755.
    #[must_use]
    pub fn executable(path: &str, contents: &[u8]) -> Self {
        Self {
            path: path.to_owned(),
            kind: TarEntryKind::File {
                contents: contents.to_vec(),
                mode: 0o755,
            },
        }
    }

    /// A directory.
    #[must_use]
    pub fn dir(path: &str) -> Self {
        Self {
            path: path.to_owned(),
            kind: TarEntryKind::Dir,
        }
    }

    /// A symbolic link pointing at `target`.
    #[must_use]
    pub fn symlink(path: &str, target: &str) -> Self {
        Self {
            path: path.to_owned(),
            kind: TarEntryKind::Symlink {
                target: target.to_owned(),
            },
        }
    }
}

/// Builds an uncompressed tar archive.
///
/// # Panics
///
/// Panics if an entry path is rejected by the `tar` crate.
#[must_use]
pub fn build_tar(entries: &[TarEntry]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_mtime(0);
        match &entry.kind {
            TarEntryKind::File { contents, mode } => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(*mode);
                header.set_size(contents.len() as u64);
                builder
                    .append_data(&mut header, &entry.path, contents.as_slice())
                    .expect("append file entry");
            }
            TarEntryKind::Dir => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder
                    .append_data(&mut header, &entry.path, std::io::empty())
                    .expect("append directory entry");
            }
            TarEntryKind::Symlink { target } => {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_mode(0o777);
                header.set_size(0);
                builder
                    .append_link(&mut header, &entry.path, target)
                    .expect("append symlink entry");
            }
        }
    }
    builder.into_inner().expect("finish tar")
}

/// gzip-compresses `bytes`.
///
/// # Panics
///
/// Panics if the in-memory encoder fails.
#[must_use]
pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// xz-compresses `bytes`.
///
/// # Panics
///
/// Panics if the in-memory encoder fails.
#[must_use]
pub fn xz(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(bytes).expect("xz write");
    encoder.finish().expect("xz finish")
}

/// Zstandard-compresses `bytes`.
///
/// # Panics
///
/// Panics if the in-memory encoder fails.
#[must_use]
pub fn zstd_compress(bytes: &[u8]) -> Vec<u8> {
    zstd::encode_all(bytes, 0).expect("zstd encode")
}

/// Builds a Debian package whose data member is named `data_member`.
///
/// `payload` is an uncompressed tar archive, compressed according to the
/// member's suffix; an unrecognised suffix stores `payload` verbatim.
///
/// # Panics
///
/// Panics if the in-memory `ar` builder fails.
#[must_use]
pub fn build_deb(data_member: &str, payload: &[u8]) -> Vec<u8> {
    let data = match data_member.rsplit('.').next() {
        Some("xz") => xz(payload),
        Some("gz") => gzip(payload),
        Some("zst") => zstd_compress(payload),
        _ => payload.to_vec(),
    };
    let control = gzip(&build_tar(&[TarEntry::file(
        "./control",
        b"Package: test\nVersion: 1.0\n",
    )]));

    let mut bytes = Vec::new();
    {
        let mut builder = ar::Builder::new(&mut bytes);
        let members: [(&str, &[u8]); 3] = [
            ("debian-binary", b"2.0\n"),
            ("control.tar.gz", &control),
            (data_member, &data),
        ];
        for (name, contents) in members {
            let header = ar::Header::new(name.as_bytes().to_vec(), contents.len() as u64);
            builder.append(&header, contents).expect("append ar member");
        }
    }
    bytes
}

/// Builds a gzip-compressed `Packages` index listing `(name, filename)`
/// pairs in order.
#[must_use]
pub fn packages_index(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut text = String::new();
    for (name, filename) in entries {
        text.push_str(&format!(
            "Package: {name}\nArchitecture: amd64\nVersion: 1.0-1\nDescription: test package\n multi-line description\nFilename: {filename}\n\n"
        ));
    }
    gzip(text.as_bytes())
}

/// Pool path used for a stub package.
#[must_use]
pub fn pool_path(section: &str, package: &str) -> String {
    let initial = package.chars().next().unwrap_or('x');
    format!("pool/{section}/{initial}/{package}/{package}_1.0-1_amd64.deb")
}

/// Data payload for a stub shared-library package.
#[must_use]
pub fn library_payload(package: &str) -> Vec<u8> {
    build_tar(&[
        TarEntry::dir("./usr/lib/x86_64-linux-gnu/"),
        TarEntry::file(
            &format!("./usr/lib/x86_64-linux-gnu/{package}.so.1.0.0"),
            package.as_bytes(),
        ),
    ])
}

/// Shell script standing in for the real `soffice` binary.
pub const FAKE_SOFFICE: &[u8] =
    b"#!/bin/sh\necho \"fake soffice $*\"\necho \"SAL_USE_VCLPLUGIN=$SAL_USE_VCLPLUGIN\"\n";

/// Where the packages inside the distribution tarball place their files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageLayout {
    /// Files under `opt/libreoffice<series>/`.
    Nested,
    /// Files directly under the package root.
    Flat,
}

/// Builds a gzip-compressed distribution tarball for `version`.
#[must_use]
pub fn libreoffice_tarball(version: &str, layout: PackageLayout) -> Vec<u8> {
    let series = version.split('.').take(2).collect::<Vec<_>>().join(".");
    let top = format!("LibreOffice_{version}_Linux_x86-64_deb");
    let prefix = match layout {
        PackageLayout::Nested => format!("./opt/libreoffice{series}/"),
        PackageLayout::Flat => "./".to_owned(),
    };

    let core = build_deb(
        "data.tar.xz",
        &build_tar(&[
            TarEntry::executable(&format!("{prefix}program/soffice"), FAKE_SOFFICE),
            TarEntry::file(
                &format!("{prefix}program/fundamentalrc"),
                b"[Bootstrap]\n",
            ),
        ]),
    );
    let basis = build_deb(
        "data.tar.gz",
        &build_tar(&[
            TarEntry::file(&format!("{prefix}program/libmergedlo.so"), b"ELF"),
            TarEntry::symlink(&format!("{prefix}program/libmerged.so"), "libmergedlo.so"),
        ]),
    );

    gzip(&build_tar(&[
        TarEntry::dir(&format!("{top}/")),
        TarEntry::dir(&format!("{top}/DEBS/")),
        TarEntry::file(
            &format!("{top}/DEBS/libreoffice{series}_{version}-1_amd64.deb"),
            &core,
        ),
        TarEntry::file(
            &format!("{top}/DEBS/libobasis{series}-core_{version}-1_amd64.deb"),
            &basis,
        ),
        TarEntry::file(&format!("{top}/readmes/README_en-US"), b"readme"),
    ]))
}

/// Builds a stub fetcher serving a complete distribution for `config`:
/// the archive, every configured package from the current release's main
/// section, and empty indexes elsewhere.
#[must_use]
pub fn distribution_fetcher(config: &BuildpackConfig, layout: PackageLayout) -> StubFetcher {
    let mut fetcher = StubFetcher::new().with_response(
        config.archive_url(),
        libreoffice_tarball(config.version(), layout),
    );

    let sources = config.index_sources();
    let mut listed = Vec::new();
    for package in config.packages() {
        let path = pool_path("main", package);
        fetcher.insert(
            format!("{}/{path}", config.mirror()),
            build_deb("data.tar.xz", &library_payload(package)),
        );
        listed.push((package.clone(), path));
    }
    let entries: Vec<(&str, &str)> = listed
        .iter()
        .map(|(name, path)| (name.as_str(), path.as_str()))
        .collect();

    for (position, source) in sources.iter().enumerate() {
        let body = if position == 0 {
            packages_index(&entries)
        } else {
            packages_index(&[])
        };
        fetcher.insert(source.url(config.mirror(), config.arch()), body);
    }
    fetcher
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Creates a temporary directory and returns it with its UTF-8 path.
///
/// # Panics
///
/// Panics if the directory cannot be created or its path is not UTF-8.
#[must_use]
pub fn utf8_tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().expect("temp dir");
    let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
    (temp, path)
}
