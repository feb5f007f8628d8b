//! Application configuration constants.
//! Defaults, file names and timing in one place.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// File names konadl keeps in the storage directory. Built once, then cached.
pub struct PackagePaths {
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    pub const DOWNLOAD_QUEUE: &'static str = "download_queue.progress";
    pub const PAGE_QUEUE: &'static str = "post_queue.progress";
    pub const METADATA: &'static str = "metadata.progress";
    pub const ERROR_LOG: &'static str = "errors.log";

    /// Build and cache paths from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                config_filename: format!(".{pkg}.toml"),
            }
        })
    }

    /// Optional per-storage-directory settings file (`.konadl.toml`).
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    pub fn download_queue_in(&self, storage: &Path) -> PathBuf {
        storage.join(Self::DOWNLOAD_QUEUE)
    }

    pub fn page_queue_in(&self, storage: &Path) -> PathBuf {
        storage.join(Self::PAGE_QUEUE)
    }

    pub fn metadata_in(&self, storage: &Path) -> PathBuf {
        storage.join(Self::METADATA)
    }

    pub fn error_log_in(&self, storage: &Path) -> PathBuf {
        storage.join(Self::ERROR_LOG)
    }
}

// ---- Worker threads ----

/// Default pool sizes.
pub struct WorkerDefaults;

impl WorkerDefaults {
    pub const PAGE_WORKERS: usize = 10;
    pub const DOWNLOAD_WORKERS: usize = 20;
    /// Thread name prefixes, numbered per worker.
    pub const PAGE_THREAD_NAME: &'static str = "Post Crawler";
    pub const DOWNLOAD_THREAD_NAME: &'static str = "Downloader";
}

// ---- Retry ----

/// Default retry timing. Attempts are unlimited unless a policy caps them.
pub struct RetryConsts;

impl RetryConsts {
    pub const BASE_DELAY: Duration = Duration::from_millis(500);
    pub const MAX_DELAY: Duration = Duration::from_secs(30);
    /// Floor for the delay after an HTTP 429.
    pub const RATE_LIMIT_DELAY: Duration = Duration::from_secs(5);
}

// ---- Polling ----

/// How often blocked threads re-check the cancel token.
pub struct PollIntervals;

impl PollIntervals {
    pub const DRAIN_WAIT: Duration = Duration::from_millis(100);
    pub const CANCEL_SLEEP_SLICE: Duration = Duration::from_millis(50);
}

// ---- HTTP ----

pub struct HttpConsts;

impl HttpConsts {
    pub const USER_AGENT: &'static str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/65.0.3325.181 Safari/537.36";
    pub const TIMEOUT: Duration = Duration::from_secs(60);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
}

// ---- Download files ----

/// Suffix for image bytes not yet validated.
pub const PART_SUFFIX: &str = "part";
