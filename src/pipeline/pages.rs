use log::{debug, info};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::queue::{Message, WorkQueue};
use crate::site::PageFetcher;
use crate::utils::config::WorkerDefaults;
use crate::{CrawlError, DownloadJob, PageJob, Post, RatingSet};

use super::context::PipelineContext;
use super::error_handler::{FailedAttempt, retry_or_abandon};

/// Queue a download for every post whose rating is enabled, in page order. Returns how many
/// were queued.
pub fn enqueue_accepted(
    ratings: &RatingSet,
    posts: &[Post],
    page: u32,
    downloads: &WorkQueue<DownloadJob>,
) -> usize {
    let mut queued = 0;
    for post in posts.iter().filter(|p| ratings.accepts(p.rating)) {
        downloads.push(DownloadJob::from_post(post, page));
        queued += 1;
    }
    queued
}

/// Single page worker: pop page numbers, fetch and filter their posts, push downloads.
/// A page is acked only after its downloads are queued, so the page queue cannot drain
/// before the download queue has seen every accepted post.
fn page_worker_loop<F: PageFetcher + ?Sized>(
    ctx: &PipelineContext,
    fetcher: &F,
    pages: &WorkQueue<PageJob>,
    downloads: &WorkQueue<DownloadJob>,
) {
    loop {
        let queued = match pages.pop() {
            Message::Shutdown => break,
            Message::Job(queued) => queued,
        };
        if ctx.cancel.is_cancelled() {
            pages.put_back(queued);
            pages.ack();
            break;
        }

        let page = queued.job.page;
        info!("Crawling page {}", page);
        match fetcher.fetch_page(page) {
            Ok(posts) => {
                let accepted = enqueue_accepted(&ctx.config.ratings, &posts, page, downloads);
                debug!("Page {}: queued {} of {} posts", page, accepted, posts.len());
            }
            Err(e) => retry_or_abandon(
                ctx,
                pages,
                queued,
                FailedAttempt {
                    page: Some(page),
                    url: None,
                    rate_limited: e.is_rate_limited(),
                    error: &e,
                },
            ),
        }
        pages.ack();
    }
    debug!(
        "{} thread exiting",
        thread::current().name().unwrap_or("page worker")
    );
}

/// Spawn `ctx.config.page_workers` page workers. Each exits after popping one shutdown sentinel.
pub fn spawn_page_workers<F: PageFetcher + ?Sized + 'static>(
    ctx: &Arc<PipelineContext>,
    fetcher: &Arc<F>,
    pages: &Arc<WorkQueue<PageJob>>,
    downloads: &Arc<WorkQueue<DownloadJob>>,
) -> Result<Vec<JoinHandle<()>>, CrawlError> {
    (0..ctx.config.page_workers)
        .map(|id| {
            let ctx = Arc::clone(ctx);
            let fetcher = Arc::clone(fetcher);
            let pages = Arc::clone(pages);
            let downloads = Arc::clone(downloads);
            thread::Builder::new()
                .name(format!("{} {}", WorkerDefaults::PAGE_THREAD_NAME, id))
                .spawn(move || page_worker_loop(&ctx, &*fetcher, &pages, &downloads))
                .map_err(CrawlError::Spawn)
        })
        .collect()
}
