use chrono::Local;
use log::{error, warn};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::FetchError;
use crate::queue::{Queued, WorkQueue};

use super::context::PipelineContext;

/// Append-only `errors.log` in the storage directory. One lock serializes all writers.
pub struct ErrorLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ErrorLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Append one record: `TIME=`, optional `PAGE=` and `URL=`, the detail, then a blank line.
    /// A failure to write is logged and otherwise ignored.
    pub fn record(&self, page: Option<u32>, url: Option<&str>, detail: &dyn fmt::Display) {
        let mut entry = format!("TIME={}\n", Local::now().format("%Y-%m-%d %H:%M:%S%.6f"));
        if let Some(page) = page {
            entry.push_str(&format!("PAGE={page}\n"));
        }
        if let Some(url) = url {
            entry.push_str(&format!("URL={url}\n"));
        }
        entry.push_str(&format!("{detail}\n\n"));

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));
        if let Err(e) = written {
            warn!("Cannot write {}: {}", self.path.display(), e);
        }
    }
}

/// Details of one failed attempt, for logging.
pub struct FailedAttempt<'a> {
    pub page: Option<u32>,
    pub url: Option<&'a str>,
    pub rate_limited: bool,
    pub error: &'a dyn fmt::Display,
}

fn log_failure(what: &dyn fmt::Display, failure: &FailedAttempt<'_>, failures: u32) {
    if failure.rate_limited {
        warn!(
            "HTTP Error 429: sending too many requests, consider fewer workers. Retrying {} later",
            what
        );
    } else {
        warn!(
            "{} failed (attempt {}): {}. Putting job back to queue",
            what, failures, failure.error
        );
    }
}

/// Handle a failed worker job: log it, record it in `errors.log`, wait out the retry delay and
/// requeue it at the back of `queue`. If the retry policy is exhausted the job is abandoned
/// instead. The caller acks the failed attempt afterwards.
pub fn retry_or_abandon<T: fmt::Display>(
    ctx: &PipelineContext,
    queue: &WorkQueue<T>,
    queued: Queued<T>,
    failure: FailedAttempt<'_>,
) {
    let failures = queued.attempt.saturating_add(1);
    log_failure(&queued.job, &failure, failures);
    ctx.error_log.record(failure.page, failure.url, failure.error);

    let policy = &ctx.config.retry;
    if !policy.allows_retry(failures) {
        error!("Giving up on {} after {} attempts", queued.job, failures);
        ctx.error_log.record(
            failure.page,
            failure.url,
            &format!("ABANDONED after {failures} attempts"),
        );
        return;
    }
    // Interrupted sleeps still requeue, so the job ends up in the checkpoint.
    ctx.cancel
        .sleep(policy.delay_for(failures, failure.rate_limited));
    queue.requeue(queued);
}

/// Result of [`retry_inline`].
#[derive(Debug)]
pub enum Retried<T> {
    Ok(T),
    Cancelled,
    Exhausted(FetchError),
}

/// Retry `op` in the calling thread under the run's retry policy. Used by the coordinator for
/// discovery calls and update-mode page walks, which are not queued.
pub fn retry_inline<T>(
    ctx: &PipelineContext,
    page: Option<u32>,
    what: &str,
    mut op: impl FnMut() -> Result<T, FetchError>,
) -> Retried<T> {
    let mut failures = 0u32;
    loop {
        if ctx.cancel.is_cancelled() {
            return Retried::Cancelled;
        }
        let e = match op() {
            Ok(value) => return Retried::Ok(value),
            Err(e) => e,
        };
        failures = failures.saturating_add(1);
        let failure = FailedAttempt {
            page,
            url: None,
            rate_limited: e.is_rate_limited(),
            error: &e,
        };
        log_failure(&what, &failure, failures);
        ctx.error_log.record(page, None, &e);

        let policy = &ctx.config.retry;
        if !policy.allows_retry(failures) {
            error!("Giving up on {} after {} attempts", what, failures);
            return Retried::Exhausted(e);
        }
        if !ctx.cancel.sleep(policy.delay_for(failures, e.is_rate_limited())) {
            return Retried::Cancelled;
        }
    }
}
