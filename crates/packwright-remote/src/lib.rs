//! Artifact retrieval for Packwright.
//!
//! This crate provides the `Transport` abstraction with HTTP (`ureq`) and
//! local-file implementations, `TransportConfig` for timeouts and the user
//! agent, and the `DownloadCache`: a content-addressed, two-tier cache that
//! fetches each dependency artifact at most once and verifies its SHA-256
//! while streaming it to disk.

pub mod cache;
pub mod config;
pub mod file;
pub mod http;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cache::DownloadCache;
pub use config::TransportConfig;
pub use file::FileTransport;
pub use http::HttpTransport;

use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not download {uri}: HTTP {status}")]
    Http { uri: String, status: u16 },
    #[error("could not download {uri}: {message}")]
    Network { uri: String, message: String },
    #[error("unsupported uri: {0}")]
    UnsupportedUri(String),
    #[error("dependency sha256 mismatch for {uri}: expected sha256 {expected}, actual sha256 {actual}")]
    IntegrityFailure {
        uri: String,
        expected: String,
        actual: String,
    },
    #[error("store error: {0}")]
    Store(#[from] packwright_store::StoreError),
    #[error("download cancelled")]
    Cancelled,
}

/// Source of artifact bytes.
///
/// Implementations return a streaming reader; the cache never buffers a whole
/// artifact in memory.
pub trait Transport: Send + Sync {
    fn fetch(&self, uri: &str) -> Result<Box<dyn Read>, RemoteError>;
}

/// Routes `http(s)://` URIs to [`HttpTransport`] and everything else to
/// [`FileTransport`].
pub struct DefaultTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl DefaultTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            http: HttpTransport::new(config),
            file: FileTransport,
        }
    }
}

impl Default for DefaultTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl Transport for DefaultTransport {
    fn fetch(&self, uri: &str) -> Result<Box<dyn Read>, RemoteError> {
        if http::is_http(uri) {
            self.http.fetch(uri)
        } else {
            self.file.fetch(uri)
        }
    }
}
