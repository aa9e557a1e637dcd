//! Magic-byte file type detection.
//!
//! A download that "succeeded" may still be an HTML error page saved under
//! the archive's name, so archives are sniffed before they are trusted.

use std::fmt;
use std::io::Read;
use std::path::Path;

/// Number of leading bytes read for sniffing and previews.
const SNIFF_LEN: usize = 512;

/// Length of the printable preview attached to diagnostics.
const PREVIEW_CHARS: usize = 160;

/// Coarse classification of a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// gzip-compressed data.
    Gzip,
    /// xz-compressed data.
    Xz,
    /// Zstandard-compressed data.
    Zstd,
    /// Unix `ar` archive (Debian package container).
    Ar,
    /// An HTML or XML document.
    Html,
    /// Other printable text.
    Text,
    /// A zero-length file.
    Empty,
    /// Anything else.
    Unknown,
}

impl FileType {
    /// Classifies `bytes` by their leading signature.
    ///
    /// ```
    /// use libreoffice_buildpack::archive::file_type::FileType;
    ///
    /// assert_eq!(FileType::sniff(&[0x1f, 0x8b, 0x08]), FileType::Gzip);
    /// assert_eq!(FileType::sniff(b"<!DOCTYPE html>"), FileType::Html);
    /// ```
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::Empty;
        }
        if bytes.starts_with(&[0x1f, 0x8b]) {
            return Self::Gzip;
        }
        if bytes.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            return Self::Xz;
        }
        if bytes.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            return Self::Zstd;
        }
        if bytes.starts_with(b"!<arch>\n") {
            return Self::Ar;
        }
        if looks_like_markup(bytes) {
            return Self::Html;
        }
        if std::str::from_utf8(bytes).is_ok_and(|s| !s.chars().any(is_binary_char)) {
            return Self::Text;
        }
        Self::Unknown
    }

    /// Human-readable description used in diagnostics.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Gzip => "gzip compressed data",
            Self::Xz => "XZ compressed data",
            Self::Zstd => "Zstandard compressed data",
            Self::Ar => "current ar archive",
            Self::Html => "HTML document",
            Self::Text => "ASCII text",
            Self::Empty => "empty",
            Self::Unknown => "data",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// The outcome of sniffing a file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sniffed {
    /// Detected type.
    pub file_type: FileType,
    /// Single-line printable rendering of the leading content.
    pub preview: String,
}

/// Reads the leading bytes of `path` and classifies them.
///
/// # Errors
///
/// Returns any I/O error raised while opening or reading the file.
pub fn sniff_file(path: &Path) -> std::io::Result<Sniffed> {
    let file = std::fs::File::open(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    Ok(Sniffed {
        file_type: FileType::sniff(&head),
        preview: preview(&head),
    })
}

/// Renders leading bytes as one printable line.
///
/// Control characters become spaces and runs of whitespace collapse, so an
/// HTML error page reads naturally in a log line.
#[must_use]
pub fn preview(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(PREVIEW_CHARS).collect()
}

fn looks_like_markup(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(bytes).trim_start().to_ascii_lowercase();
    ["<!doctype html", "<html", "<?xml", "<head", "<body"]
        .iter()
        .any(|prefix| head.starts_with(prefix))
}

fn is_binary_char(c: char) -> bool {
    c.is_control() && !matches!(c, '\n' | '\r' | '\t')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::gzip(&[0x1f, 0x8b, 0x08, 0x00], FileType::Gzip)]
    #[case::xz(&[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x00], FileType::Xz)]
    #[case::zstd(&[0x28, 0xb5, 0x2f, 0xfd, 0x00], FileType::Zstd)]
    #[case::ar(b"!<arch>\ndebian-binary   ", FileType::Ar)]
    #[case::html(b"  \n<!DOCTYPE HTML PUBLIC", FileType::Html)]
    #[case::xml(b"<?xml version=\"1.0\"?><Error>", FileType::Html)]
    #[case::text(b"404 page not found\n", FileType::Text)]
    #[case::empty(b"", FileType::Empty)]
    #[case::binary(&[0x00, 0x01, 0x02, 0xff], FileType::Unknown)]
    fn sniff_classifies_signatures(#[case] bytes: &[u8], #[case] expected: FileType) {
        assert_eq!(FileType::sniff(bytes), expected);
    }

    #[test]
    fn preview_flattens_markup() {
        let rendered = preview(b"<html>\n  <body>\r\n\tNot Found\n</body></html>");
        assert_eq!(rendered, "<html> <body> Not Found </body></html>");
    }

    #[test]
    fn preview_is_bounded() {
        let long = "a".repeat(4096);
        assert_eq!(preview(long.as_bytes()).chars().count(), PREVIEW_CHARS);
    }

    #[test]
    fn sniff_file_reads_leading_bytes() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("page.tar.gz");
        std::fs::write(&path, "<!DOCTYPE html><title>Error</title>").expect("write");

        let sniffed = sniff_file(&path).expect("sniff");
        assert_eq!(sniffed.file_type, FileType::Html);
        assert!(sniffed.preview.contains("<title>Error</title>"));
    }
}
