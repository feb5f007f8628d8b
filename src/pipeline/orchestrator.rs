use log::{debug, info, warn};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::checkpoint::CheckpointManager;
use crate::engine::tools::prepare_storage;
use crate::queue::WorkQueue;
use crate::site::Site;
use crate::{
    CrawlError, CrawlMode, CrawlReport, DownloadJob, FetchError, PageJob, PostId, RunConfig,
    RunMetadata,
};

use super::context::{CancelToken, PipelineContext};
use super::downloads::spawn_download_workers;
use super::error_handler::{Retried, retry_inline};
use super::pages::spawn_page_workers;
use super::update::crawl_new_images;

/// Progress carried over from earlier runs of a resumed job.
#[derive(Clone, Copy, Debug, Default)]
struct Carried {
    downloads: u64,
    elapsed: Duration,
}

impl From<&RunMetadata> for Carried {
    fn from(meta: &RunMetadata) -> Self {
        Self {
            downloads: meta.total_downloads,
            elapsed: meta.elapsed(),
        }
    }
}

/// Checkpointed job loaded at the start of a resume.
struct ResumeState {
    meta: RunMetadata,
    pages: WorkQueue<PageJob>,
    downloads: WorkQueue<DownloadJob>,
}

/// Join handles of both pools. Either may be empty (update runs have no page workers).
#[derive(Default)]
struct Pools {
    pages: Vec<JoinHandle<()>>,
    downloads: Vec<JoinHandle<()>>,
}

/// How a run ended, handed to [`Crawler::finish`].
struct Outcome<'a> {
    done: bool,
    carried: Carried,
    newest: Option<PostId>,
    ctx: &'a PipelineContext,
}

/// Runs one crawl job against a site: seeds the queues, drives both worker pools, and
/// checkpoints whatever is left when interrupted.
///
/// Ctrl+C (or [`CancelToken::cancel`]) pauses the job. Workers are stopped and joined before
/// the queues are written out, so a paused job never loses or duplicates queued work.
pub struct Crawler<S: Site + ?Sized> {
    config: RunConfig,
    site: Arc<S>,
    cancel: CancelToken,
    checkpoints: CheckpointManager,
}

impl<S: Site + ?Sized + 'static> Crawler<S> {
    pub fn new(config: RunConfig, site: Arc<S>) -> Self {
        let checkpoints = CheckpointManager::new(&config.storage_root);
        Self {
            config,
            site,
            cancel: CancelToken::new(),
            checkpoints,
        }
    }

    /// Use `cancel` instead of a private token, e.g. one shared with a signal handler.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Run `mode` to completion or until cancelled. Per-job failures are retried (or abandoned
    /// under a bounded policy) and never end the run; only setup and checkpoint I/O errors do.
    pub fn run(&self, mode: CrawlMode) -> Result<CrawlReport, CrawlError> {
        let started = Instant::now();
        if !self.config.storage_root.is_dir() {
            return Err(CrawlError::StorageMissing(self.config.storage_root.clone()));
        }
        match mode {
            CrawlMode::Update => self.run_update(started),
            _ => self.run_crawl(mode, started),
        }
    }

    fn run_crawl(&self, mode: CrawlMode, started: Instant) -> Result<CrawlReport, CrawlError> {
        let resumed = match mode {
            CrawlMode::Resume => Some(self.load_resume_state()?),
            _ => None,
        };
        let config = match &resumed {
            Some(state) => self.config.with_ratings(state.meta.ratings),
            None => self.config.clone(),
        };
        let carried = resumed
            .as_ref()
            .map(|state| Carried::from(&state.meta))
            .unwrap_or_default();
        let ctx = Arc::new(PipelineContext::new(config, self.cancel.clone()));

        let (pages, downloads, newest) = match resumed {
            Some(state) => {
                // Keep the id recorded when the job started so a later update still covers
                // posts added while it was paused.
                let newest = match state.meta.previous_newest_id {
                    Some(id) => Some(id),
                    None => match self.discover(&ctx, "newest post lookup", || {
                        self.site.newest_post_id()
                    })? {
                        Some(newest) => newest,
                        None => return Ok(paused_before_start(carried, started)),
                    },
                };
                info!(
                    "Resuming job: {} pages and {} images queued",
                    state.pages.pending(),
                    state.downloads.pending()
                );
                (state.pages, state.downloads, newest)
            }
            None => {
                let Some(newest) = self.discover(&ctx, "newest post lookup", || {
                    self.site.newest_post_id()
                })?
                else {
                    return Ok(paused_before_start(carried, started));
                };
                let last_page = match mode {
                    CrawlMode::Pages(n) => n,
                    _ => match self.discover(&ctx, "page count lookup", || {
                        self.site.total_pages()
                    })? {
                        Some(n) => n,
                        None => return Ok(paused_before_start(carried, started)),
                    },
                };
                info!("Crawling pages 1 to {}", last_page);
                (
                    WorkQueue::from_jobs((1..=last_page).map(|page| PageJob { page })),
                    WorkQueue::unbounded(),
                    newest,
                )
            }
        };

        prepare_storage(&ctx.config)?;
        let pages = Arc::new(pages);
        let downloads = Arc::new(downloads);
        let pools = self.start_pools(&ctx, &pages, &downloads, true)?;

        let done = pages.wait_drained(&self.cancel) && downloads.wait_drained(&self.cancel);
        self.finish(
            &pages,
            &downloads,
            pools,
            Outcome {
                done,
                carried,
                newest,
                ctx: &ctx,
            },
            started,
        )
    }

    fn run_update(&self, started: Instant) -> Result<CrawlReport, CrawlError> {
        let meta = self
            .checkpoints
            .load_metadata_if_present()?
            .ok_or(CrawlError::NoMetadata)?;
        let previous = meta
            .previous_newest_id
            .clone()
            .ok_or(CrawlError::NoMetadata)?;
        let ctx = Arc::new(PipelineContext::new(
            self.config.with_ratings(meta.ratings),
            self.cancel.clone(),
        ));
        let carried = Carried::default();

        let Some(current) =
            self.discover(&ctx, "newest post lookup", || self.site.newest_post_id())?
        else {
            return Ok(paused_before_start(carried, started));
        };
        if current.as_ref() == Some(&previous) {
            info!("No new images since post {}", previous);
            return Ok(CrawlReport {
                done: true,
                downloads: 0,
                elapsed: started.elapsed(),
            });
        }
        let Some(total_pages) =
            self.discover(&ctx, "page count lookup", || self.site.total_pages())?
        else {
            return Ok(paused_before_start(carried, started));
        };

        prepare_storage(&ctx.config)?;
        let pages = Arc::new(WorkQueue::unbounded());
        let downloads = Arc::new(WorkQueue::unbounded());
        let pools = self.start_pools(&ctx, &pages, &downloads, false)?;

        info!("Looking for images newer than post {}", previous);
        let scan = crawl_new_images(&ctx, &*self.site, total_pages, &previous, &downloads);
        info!("Queued {} new images", scan.queued());
        debug!("Update scan finished: {:?}", scan);
        let done = scan.is_complete() && downloads.wait_drained(&self.cancel);
        // Until every new image is on disk the old boundary must stay, or a later update
        // would skip what this one left behind.
        let newest = if done { current } else { Some(previous) };
        self.finish(
            &pages,
            &downloads,
            pools,
            Outcome {
                done,
                carried,
                newest,
                ctx: &ctx,
            },
            started,
        )
    }

    fn load_resume_state(&self) -> Result<ResumeState, CrawlError> {
        if !self.checkpoints.checkpoints_exist() {
            return Err(CrawlError::NoCheckpoint);
        }
        let meta = self
            .checkpoints
            .load_metadata_if_present()?
            .ok_or(CrawlError::NoMetadata)?;
        let (pages, downloads) = self.checkpoints.load_queues()?;
        Ok(ResumeState {
            meta,
            pages,
            downloads,
        })
    }

    /// Run a discovery call under the retry policy. `Ok(None)` means cancelled.
    fn discover<T>(
        &self,
        ctx: &PipelineContext,
        what: &str,
        op: impl FnMut() -> Result<T, FetchError>,
    ) -> Result<Option<T>, CrawlError> {
        match retry_inline(ctx, None, what, op) {
            Retried::Ok(value) => Ok(Some(value)),
            Retried::Cancelled => Ok(None),
            Retried::Exhausted(e) => Err(CrawlError::Discovery(e)),
        }
    }

    fn start_pools(
        &self,
        ctx: &Arc<PipelineContext>,
        pages: &Arc<WorkQueue<PageJob>>,
        downloads: &Arc<WorkQueue<DownloadJob>>,
        with_page_workers: bool,
    ) -> Result<Pools, CrawlError> {
        let mut pools = Pools::default();
        let spawned = spawn_download_workers(ctx, &self.site, downloads).and_then(|handles| {
            pools.downloads = handles;
            if with_page_workers {
                pools.pages = spawn_page_workers(ctx, &self.site, pages, downloads)?;
            }
            Ok(())
        });
        if let Err(e) = spawned {
            // Release whatever did start; handles from a failed batch are already detached.
            self.cancel.cancel();
            pages.shutdown(ctx.config.page_workers);
            downloads.shutdown(ctx.config.download_workers);
            return Err(e);
        }
        debug!(
            "Started {} page workers and {} download workers",
            pools.pages.len(),
            pools.downloads.len()
        );
        Ok(pools)
    }

    /// Stop both pools, then either checkpoint what is left or clear old checkpoints, and
    /// write metadata.
    fn finish(
        &self,
        pages: &WorkQueue<PageJob>,
        downloads: &WorkQueue<DownloadJob>,
        pools: Pools,
        outcome: Outcome<'_>,
        started: Instant,
    ) -> Result<CrawlReport, CrawlError> {
        if !outcome.done {
            info!("Stopping workers...");
        }
        // Page workers first: they are the only producers for the download queue.
        pages.shutdown(pools.pages.len());
        join_all(pools.pages);
        downloads.shutdown(pools.downloads.len());
        join_all(pools.downloads);

        if !outcome.done && (pages.pending() > 0 || downloads.pending() > 0) {
            let (saved_pages, saved_downloads) = self.checkpoints.save_queues(pages, downloads)?;
            info!(
                "Saved {} pages and {} images for later",
                saved_pages, saved_downloads
            );
        } else {
            self.checkpoints.remove_checkpoints()?;
        }

        let ctx = outcome.ctx;
        let downloads_total = outcome.carried.downloads + ctx.stats.downloads();
        let elapsed = outcome.carried.elapsed.saturating_add(started.elapsed());
        self.checkpoints.save_metadata(&RunMetadata {
            ratings: ctx.config.ratings,
            total_downloads: downloads_total,
            elapsed_secs: elapsed.as_secs_f64(),
            previous_newest_id: outcome.newest,
            job_done: outcome.done,
        })?;

        Ok(CrawlReport {
            done: outcome.done,
            downloads: downloads_total,
            elapsed,
        })
    }
}

/// Report for a run cancelled during discovery. Nothing on disk was touched.
fn paused_before_start(carried: Carried, started: Instant) -> CrawlReport {
    CrawlReport {
        done: false,
        downloads: carried.downloads,
        elapsed: carried.elapsed.saturating_add(started.elapsed()),
    }
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let name = handle.thread().name().unwrap_or("worker").to_string();
        if handle.join().is_err() {
            warn!("{} panicked", name);
        }
    }
}
