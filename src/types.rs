//! Public and internal types for the konadl API and pipeline.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::pipeline::RetryPolicy;
use crate::utils::config::WorkerDefaults;

/// Content classification of a post.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rating {
    Safe,
    Questionable,
    Explicit,
}

impl Rating {
    pub const ALL: [Rating; 3] = [Rating::Safe, Rating::Questionable, Rating::Explicit];

    /// Lowercase name used in checkpoint records and rating subdirectories.
    pub const fn as_str(self) -> &'static str {
        match self {
            Rating::Safe => "safe",
            Rating::Questionable => "questionable",
            Rating::Explicit => "explicit",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "safe" => Ok(Rating::Safe),
            "questionable" => Ok(Rating::Questionable),
            "explicit" => Ok(Rating::Explicit),
            other => Err(format!("unknown rating '{other}'")),
        }
    }
}

/// Set of ratings enabled for a run. Doubles as the rating filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RatingSet {
    pub safe: bool,
    pub questionable: bool,
    pub explicit: bool,
}

impl RatingSet {
    pub const fn new(safe: bool, questionable: bool, explicit: bool) -> Self {
        Self {
            safe,
            questionable,
            explicit,
        }
    }

    /// Safe only; the default for a fresh run.
    pub const fn safe_only() -> Self {
        Self::new(true, false, false)
    }

    /// True iff posts with `rating` should be downloaded.
    pub const fn accepts(&self, rating: Rating) -> bool {
        match rating {
            Rating::Safe => self.safe,
            Rating::Questionable => self.questionable,
            Rating::Explicit => self.explicit,
        }
    }

    pub const fn is_empty(&self) -> bool {
        !(self.safe || self.questionable || self.explicit)
    }

    /// Enabled ratings in canonical order.
    pub fn enabled(&self) -> impl Iterator<Item = Rating> + '_ {
        Rating::ALL.into_iter().filter(|r| self.accepts(*r))
    }
}

/// Site-assigned post identifier (e.g. `p123456`). Only equality matters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PostId(String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One entry parsed from a listing page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub image_url: String,
    pub rating: Rating,
}

/// A listing page to crawl. Identity is the page number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageJob {
    pub page: u32,
}

impl fmt::Display for PageJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}", self.page)
    }
}

/// One image to download. Re-enqueued verbatim on failure.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DownloadJob {
    pub url: String,
    pub page: u32,
    pub rating: Rating,
}

impl DownloadJob {
    pub fn from_post(post: &Post, page: u32) -> Self {
        Self {
            url: post.image_url.clone(),
            page,
            rating: post.rating,
        }
    }
}

impl fmt::Display for DownloadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (page {}, {})", self.url, self.page, self.rating)
    }
}

/// Which board to crawl.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SiteVariant {
    /// konachan.com
    #[default]
    Primary,
    /// yande.re
    Alternate,
}

impl SiteVariant {
    pub const fn root_url(self) -> &'static str {
        match self {
            SiteVariant::Primary => "https://konachan.com",
            SiteVariant::Alternate => "https://yande.re",
        }
    }
}

/// Settings for one run. Built before the run starts and shared read-only with every worker.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub ratings: RatingSet,
    /// Directory for images, checkpoint files and `errors.log`. Must exist.
    pub storage_root: PathBuf,
    /// Nest images under `<storage_root>/<rating>/`.
    pub separate_by_rating: bool,
    pub page_workers: usize,
    pub download_workers: usize,
    pub site: SiteVariant,
    pub retry: RetryPolicy,
    /// Show a download counter on stderr.
    pub show_progress: bool,
}

impl RunConfig {
    /// Defaults for `storage_root`: Safe only, default worker counts, unlimited retry.
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            ratings: RatingSet::safe_only(),
            storage_root: storage_root.into(),
            separate_by_rating: false,
            page_workers: WorkerDefaults::PAGE_WORKERS,
            download_workers: WorkerDefaults::DOWNLOAD_WORKERS,
            site: SiteVariant::Primary,
            retry: RetryPolicy::default(),
            show_progress: false,
        }
    }

    /// Copy of this config with `ratings` replaced (resume and update take ratings from metadata).
    pub fn with_ratings(&self, ratings: RatingSet) -> Self {
        Self {
            ratings,
            ..self.clone()
        }
    }
}

/// Statistics and settings persisted between runs by the checkpoint manager.
#[derive(Clone, Debug, PartialEq)]
pub struct RunMetadata {
    pub ratings: RatingSet,
    pub total_downloads: u64,
    pub elapsed_secs: f64,
    pub previous_newest_id: Option<PostId>,
    pub job_done: bool,
}

impl RunMetadata {
    /// Elapsed time as a `Duration`; zero if `elapsed_secs` is not representable.
    pub fn elapsed(&self) -> Duration {
        Duration::try_from_secs_f64(self.elapsed_secs).unwrap_or_default()
    }
}

/// What a run should do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrawlMode {
    /// Crawl listing pages `1..=n`.
    Pages(u32),
    /// Crawl every listing page the site reports.
    All,
    /// Download only posts newer than the newest id stored in metadata.
    Update,
    /// Continue the job stored in the checkpoint files.
    Resume,
}

/// Outcome of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct CrawlReport {
    /// True when all requested work finished; false when the job was paused into checkpoints.
    pub done: bool,
    /// Images downloaded, including those from earlier runs of a resumed job.
    pub downloads: u64,
    /// Wall time, including earlier runs of a resumed job.
    pub elapsed: Duration,
}
