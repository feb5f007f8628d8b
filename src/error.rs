//! Error types: collaborator failures, download failures, and run-level errors.

use std::path::PathBuf;

use thiserror::Error;

/// A listing, discovery or image request failed. Always retryable.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Server answered 429.
    #[error("HTTP 429: too many requests")]
    RateLimited,

    /// Server answered with any other non-2xx status.
    #[error("HTTP status {status}")]
    Status { status: u16 },

    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }
}

/// One download attempt failed; the job is requeued.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Bytes written differ from the server-declared content length.
    #[error("Faulty download: expected {expected} bytes, wrote {written}")]
    SizeMismatch { expected: u64, written: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, DownloadError::Fetch(FetchError::RateLimited))
    }
}

/// Errors that end a run. Per-job failures never surface here.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// A checkpoint file exists but cannot be trusted; resuming would risk silent data loss.
    #[error("Faulty checkpoint file '{path}' (line {line}): {reason}")]
    FaultyCheckpoint {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Storage directory not found: {0}")]
    StorageMissing(PathBuf),

    #[error("No checkpoint to resume from")]
    NoCheckpoint,

    #[error("No previous run metadata; run a regular crawl before updating")]
    NoMetadata,

    /// Newest-id or page-count lookup failed after the retry policy gave up.
    #[error("Site discovery failed: {0}")]
    Discovery(#[source] FetchError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to encode run metadata: {0}")]
    MetadataEncode(#[from] toml::ser::Error),
}

impl CrawlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlError::Io {
            path: path.into(),
            source,
        }
    }
}
