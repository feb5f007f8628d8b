//! Shared state handed to every worker: run config, cancel token, counters, error log.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::RunConfig;
use crate::engine::progress::{ProgressBar, create_counter, update_progress_bar};
use crate::utils::config::{PackagePaths, PollIntervals};

use super::error_handler::ErrorLog;

/// Cloneable interrupt flag. Set once by a signal handler (or a test), observed by the
/// coordinator and every worker.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on cancellation. Returns false if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(PollIntervals::CANCEL_SLEEP_SLICE));
        }
    }
}

/// Counters updated concurrently by download workers.
#[derive(Debug, Default)]
pub struct RunStats {
    downloads: AtomicU64,
}

impl RunStats {
    pub fn record_download(&self) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Images downloaded by this run.
    pub fn downloads(&self) -> u64 {
        self.downloads.load(Ordering::Relaxed)
    }
}

/// Everything a worker needs besides its queues and collaborator. Built once per run by the
/// coordinator and shared behind an `Arc`; `config` is never mutated after construction.
pub struct PipelineContext {
    pub config: RunConfig,
    pub cancel: CancelToken,
    pub stats: RunStats,
    pub error_log: ErrorLog,
    pub progress: Option<ProgressBar>,
}

impl PipelineContext {
    pub fn new(config: RunConfig, cancel: CancelToken) -> Self {
        let error_log = ErrorLog::new(PackagePaths::get().error_log_in(&config.storage_root));
        let progress = config
            .show_progress
            .then(|| create_counter("Downloading"));
        Self {
            config,
            cancel,
            stats: RunStats::default(),
            error_log,
            progress,
        }
    }

    /// Count one finished download and tick the progress counter.
    pub fn record_download(&self) {
        self.stats.record_download();
        if let Some(bar) = &self.progress {
            update_progress_bar(bar, 1);
        }
    }
}
