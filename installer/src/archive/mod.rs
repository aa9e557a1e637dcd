//! Archive handling without a system package manager.
//!
//! - [`file_type`] sniffs leading bytes to tell real archives from error pages
//! - [`tarball`] unpacks tar streams with path traversal protection
//! - [`deb`] opens Debian package containers and unpacks their data payload

pub mod deb;
pub mod file_type;
pub mod tarball;

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no files.
    #[error("archive contains no files")]
    EmptyArchive,

    /// A Debian package has no `data.tar*` member.
    #[error("package has no data member (members: {})", members.join(", "))]
    MissingDataMember {
        /// Names of the members that were present.
        members: Vec<String>,
    },

    /// A Debian package's data member uses an unsupported compression.
    #[error("unsupported data member compression: {member}")]
    UnsupportedCompression {
        /// Name of the data member.
        member: String,
    },
}
