use log::{debug, error, info};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::engine::tools::output_path;
use crate::queue::{Message, WorkQueue};
use crate::site::{ImageBody, ImageSource};
use crate::utils::config::WorkerDefaults;
use crate::utils::{part_path_for, remove_if_exists};
use crate::{CrawlError, DownloadError, DownloadJob};

use super::context::PipelineContext;
use super::error_handler::{FailedAttempt, retry_or_abandon};

/// Write `body` to `part`, check the byte count against the declared length, then move it to
/// `path`. Returns the number of bytes written.
fn write_validated(part: &Path, path: &Path, body: &ImageBody) -> Result<u64, DownloadError> {
    let mut file = File::create(part)?;
    file.write_all(&body.bytes)?;
    file.flush()?;
    let written = file.metadata()?.len();
    drop(file);
    if let Some(expected) = body.declared_len
        && expected != written
    {
        return Err(DownloadError::SizeMismatch { expected, written });
    }
    fs::rename(part, path)?;
    Ok(written)
}

/// Fetch `url` and store it at `path`. Nothing is left at `path` or its `.part` sibling
/// unless the download validated.
pub fn download_to<S: ImageSource + ?Sized>(
    source: &S,
    url: &str,
    path: &Path,
) -> Result<u64, DownloadError> {
    let body = source.fetch_image(url)?;
    let part = part_path_for(path);
    let result = write_validated(&part, path, &body);
    if result.is_err() {
        let _ = remove_if_exists(&part);
    }
    result
}

/// Single download worker: pop jobs, download each to its output path, requeue failures.
/// Exits on a shutdown sentinel or on the first job popped after cancellation.
fn download_worker_loop<S: ImageSource + ?Sized>(
    ctx: &PipelineContext,
    source: &S,
    downloads: &WorkQueue<DownloadJob>,
) {
    loop {
        let queued = match downloads.pop() {
            Message::Shutdown => break,
            Message::Job(queued) => queued,
        };
        if ctx.cancel.is_cancelled() {
            // The job stays queued for the checkpoint; leftover sentinels are discarded by drain.
            downloads.put_back(queued);
            downloads.ack();
            break;
        }

        let job = &queued.job;
        let Some(path) = output_path(&ctx.config, job) else {
            error!("[Page={}] No file name in {}, skipping", job.page, job.url);
            ctx.error_log.record(
                Some(job.page),
                Some(&job.url),
                &"SKIPPED: URL has no file name",
            );
            downloads.ack();
            continue;
        };
        info!("[Page={}] Retrieving: {}", job.page, job.url);
        match download_to(source, &job.url, &path) {
            Ok(bytes) => {
                ctx.record_download();
                debug!("Saved {} ({} bytes)", path.display(), bytes);
            }
            Err(e) => {
                let page = job.page;
                let url = job.url.clone();
                retry_or_abandon(
                    ctx,
                    downloads,
                    queued,
                    FailedAttempt {
                        page: Some(page),
                        url: Some(&url),
                        rate_limited: e.is_rate_limited(),
                        error: &e,
                    },
                );
            }
        }
        downloads.ack();
    }
    debug!(
        "{} thread exiting",
        thread::current().name().unwrap_or("download worker")
    );
}

/// Spawn `ctx.config.download_workers` download workers.
pub fn spawn_download_workers<S: ImageSource + ?Sized + 'static>(
    ctx: &Arc<PipelineContext>,
    source: &Arc<S>,
    downloads: &Arc<WorkQueue<DownloadJob>>,
) -> Result<Vec<JoinHandle<()>>, CrawlError> {
    (0..ctx.config.download_workers)
        .map(|id| {
            let ctx = Arc::clone(ctx);
            let source = Arc::clone(source);
            let downloads = Arc::clone(downloads);
            thread::Builder::new()
                .name(format!("{} {}", WorkerDefaults::DOWNLOAD_THREAD_NAME, id))
                .spawn(move || download_worker_loop(&ctx, &*source, &downloads))
                .map_err(CrawlError::Spawn)
        })
        .collect()
}
