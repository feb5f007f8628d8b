//! konadl: concurrent image downloader for Moebooru boards (konachan.com, yande.re).
//!
//! A run crawls listing pages with one worker pool, filters posts by rating, and downloads the
//! images with a second pool. Interrupted runs are checkpointed to the storage directory and
//! can be resumed; `Update` runs fetch only what is newer than the last run.

pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod site;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use checkpoint::CheckpointManager;
pub use error::{CrawlError, DownloadError, FetchError};
pub use pipeline::{CancelToken, Crawler, RetryPolicy};
pub use queue::{Message, Queued, WorkQueue};
pub use site::{Discovery, ImageBody, ImageSource, MoebooruSite, PageFetcher, Site};

use log::debug;
use std::sync::Arc;

/// Result alias used by the public konadl API
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Single entry point: run `mode` against `site` with `config` until it finishes or `cancel`
/// fires. `report.done` is true when all requested work completed (checkpoints removed) and
/// false when the job was paused (checkpoints written, run [`CrawlMode::Resume`] later).
///
/// ```ignore
/// let site = Arc::new(MoebooruSite::new(SiteVariant::Primary)?);
/// let report = konadl::crawl(RunConfig::new("/data/kona"), site, CrawlMode::Pages(3), CancelToken::new())?;
/// ```
pub fn crawl<S: Site + ?Sized + 'static>(
    config: RunConfig,
    site: Arc<S>,
    mode: CrawlMode,
    cancel: CancelToken,
) -> Result<CrawlReport> {
    let config_str = format!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        config
    );
    debug!("{}", config_str);

    Crawler::new(config, site).with_cancel_token(cancel).run(mode)
}
