//! Debian package extraction without `dpkg`.
//!
//! A `.deb` is an `ar` container holding `debian-binary`, a control archive
//! and a data archive. Only the data archive is unpacked; control metadata
//! is discarded.

use super::ExtractionError;
use super::tarball::unpack_tar;
use flate2::read::GzDecoder;
use log::trace;
use std::io::{BufReader, Read};
use std::path::Path;

/// Compression used by a package's data member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCompression {
    /// `data.tar.xz`.
    Xz,
    /// `data.tar.gz`.
    Gzip,
    /// `data.tar.zst`.
    Zstd,
}

impl DataCompression {
    /// Maps a data member name to its compression, if supported.
    ///
    /// ```
    /// use libreoffice_buildpack::archive::deb::DataCompression;
    ///
    /// assert_eq!(DataCompression::from_member_name("data.tar.xz"), Some(DataCompression::Xz));
    /// assert_eq!(DataCompression::from_member_name("data.tar.bz2"), None);
    /// ```
    #[must_use]
    pub fn from_member_name(name: &str) -> Option<Self> {
        match name {
            "data.tar.xz" => Some(Self::Xz),
            "data.tar.gz" => Some(Self::Gzip),
            "data.tar.zst" => Some(Self::Zstd),
            _ => None,
        }
    }
}

/// Unpacks the data payload of the package at `deb_path` into `dest_dir`.
///
/// Returns the relative paths of the files extracted.
///
/// # Errors
///
/// Returns [`ExtractionError::UnsupportedCompression`] when the data member
/// uses a compression other than xz, gzip or zstd,
/// [`ExtractionError::MissingDataMember`] when there is no data member, and
/// the errors of [`unpack_tar`] for the payload itself.
pub fn extract_deb(deb_path: &Path, dest_dir: &Path) -> Result<Vec<String>, ExtractionError> {
    let file = std::fs::File::open(deb_path)?;
    let mut archive = ar::Archive::new(BufReader::new(file));
    let mut members = Vec::new();

    while let Some(entry_result) = archive.next_entry() {
        let entry = entry_result?;
        let name = member_name(entry.header().identifier());
        trace!("{}: member {name}", deb_path.display());

        if !name.starts_with("data.tar") {
            members.push(name);
            continue;
        }

        return match DataCompression::from_member_name(&name) {
            Some(compression) => unpack_payload(compression, entry, dest_dir),
            None => Err(ExtractionError::UnsupportedCompression { member: name }),
        };
    }

    Err(ExtractionError::MissingDataMember { members })
}

fn unpack_payload<R: Read>(
    compression: DataCompression,
    payload: R,
    dest_dir: &Path,
) -> Result<Vec<String>, ExtractionError> {
    match compression {
        DataCompression::Xz => unpack_tar(xz2::read::XzDecoder::new(payload), dest_dir),
        DataCompression::Gzip => unpack_tar(GzDecoder::new(payload), dest_dir),
        DataCompression::Zstd => unpack_tar(zstd::Decoder::new(payload)?, dest_dir),
    }
}

/// Decodes an `ar` member identifier, dropping GNU-style `/` terminators
/// and padding.
fn member_name(identifier: &[u8]) -> String {
    String::from_utf8_lossy(identifier)
        .trim_end()
        .trim_end_matches('/')
        .to_owned()
}
