//! Update-mode discovery: stream posts newer than the last run straight into the download queue.

use log::{error, info};

use crate::queue::WorkQueue;
use crate::site::PageFetcher;
use crate::{DownloadJob, PostId};

use super::context::PipelineContext;
use super::error_handler::{Retried, retry_inline};
use super::pages::enqueue_accepted;

/// How an update scan ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateScan {
    /// Stopped at the post seen as newest by the previous run.
    ReachedBoundary { queued: usize },
    /// Walked every page without meeting the boundary post.
    Exhausted { queued: usize },
    /// Interrupted before the boundary was reached.
    Cancelled { queued: usize },
}

impl UpdateScan {
    pub const fn queued(self) -> usize {
        match self {
            UpdateScan::ReachedBoundary { queued }
            | UpdateScan::Exhausted { queued }
            | UpdateScan::Cancelled { queued } => queued,
        }
    }

    /// True unless the scan was cut short.
    pub const fn is_complete(self) -> bool {
        !matches!(self, UpdateScan::Cancelled { .. })
    }
}

/// Walk listing pages from 1 upward, queueing accepted posts in page order, and stop at the
/// first post whose id equals `previous_newest`. Nothing at or after that post is queued.
pub fn crawl_new_images<F: PageFetcher + ?Sized>(
    ctx: &PipelineContext,
    fetcher: &F,
    total_pages: u32,
    previous_newest: &PostId,
    downloads: &WorkQueue<DownloadJob>,
) -> UpdateScan {
    let mut queued = 0;
    for page in 1..=total_pages {
        info!("Crawling page {}", page);
        let posts = match retry_inline(ctx, Some(page), &format!("page {page}"), || {
            fetcher.fetch_page(page)
        }) {
            Retried::Ok(posts) => posts,
            Retried::Cancelled => return UpdateScan::Cancelled { queued },
            Retried::Exhausted(e) => {
                error!("Skipping page {}: {}", page, e);
                continue;
            }
        };
        match posts.iter().position(|p| &p.id == previous_newest) {
            Some(boundary) => {
                queued += enqueue_accepted(&ctx.config.ratings, &posts[..boundary], page, downloads);
                info!("Reached previously downloaded post {}", previous_newest);
                return UpdateScan::ReachedBoundary { queued };
            }
            None => queued += enqueue_accepted(&ctx.config.ratings, &posts, page, downloads),
        }
    }
    UpdateScan::Exhausted { queued }
}
