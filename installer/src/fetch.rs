//! Network access for archives, packages and package indexes.
//!
//! Provides a trait-based abstraction over HTTP so that every stage can be
//! exercised in tests without network access. Each request is attempted
//! exactly once.

use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Timeout for establishing a connection. Transfers themselves are not
/// bounded because the distribution archive runs to hundreds of MiB.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for fetching remote resources.
///
/// # Examples
///
/// ```no_run
/// use libreoffice_buildpack::fetch::{Fetcher, HttpFetcher};
///
/// let bytes = HttpFetcher.fetch_bytes("http://archive.ubuntu.com/ubuntu/dists/jammy/Release")?;
/// assert!(!bytes.is_empty());
/// # Ok::<(), libreoffice_buildpack::fetch::FetchError>(())
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Fetcher {
    /// Fetch `url` into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the resource is missing.
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Fetch `url` into the file at `dest`, returning the byte count.
    ///
    /// `dest` is only created once the whole body has been received, so a
    /// failed transfer never leaves a truncated file under the final name.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the file write fails.
    fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Errors arising from fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("request failed for {url}: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The resource does not exist (HTTP 404).
    #[error("not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the fetched body.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP fetcher using `ureq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

impl Fetcher for HttpFetcher {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = http_agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut body = response.into_body();
        let mut bytes = Vec::new();
        std::io::copy(&mut body.as_reader(), &mut bytes).map_err(|e| FetchError::Http {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(bytes)
    }

    fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = http_agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let mut partial = tempfile::NamedTempFile::new_in(parent)?;
        let mut body = response.into_body();
        let written = std::io::copy(&mut body.as_reader(), &mut partial)?;
        partial.flush()?;
        partial.persist(dest).map_err(|e| FetchError::Io(e.error))?;
        Ok(written)
    }
}

/// Shared `ureq` agent with connect timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound {
            url: url.to_owned(),
        },
        other => FetchError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
