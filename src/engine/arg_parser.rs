use clap::Parser;
use std::path::PathBuf;

use crate::CrawlMode;

/// Bulk image downloader for konachan.com and yande.re.
#[derive(Clone, Debug, Parser)]
#[command(name = "konadl")]
#[command(
    about = "Download images from konachan.com or yande.re. Ctrl+C pauses the job; run again to resume."
)]
pub struct Cli {
    /// Directory for images and progress files. Must already exist.
    #[arg(long, short = 'o', value_name = "DIR")]
    pub storage: PathBuf,

    /// Crawl listing pages 1 through N.
    #[arg(long, short = 'n', value_name = "N", value_parser = clap::value_parser!(u32).range(1..), conflicts_with_all = ["all", "update"])]
    pub pages: Option<u32>,

    /// Crawl every listing page on the site.
    #[arg(long, short = 'a', conflicts_with = "update")]
    pub all: bool,

    /// Download only posts newer than the newest one seen by the last run.
    #[arg(long, short = 'u')]
    pub update: bool,

    /// Include safe-rated images. When any rating flag is given, only the given ratings are used.
    #[arg(long, short = 's', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub safe: Option<bool>,

    /// Include questionable-rated images.
    #[arg(long, short = 'q', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub questionable: Option<bool>,

    /// Include explicit-rated images.
    #[arg(long, short = 'e', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub explicit: Option<bool>,

    /// Store images in one subdirectory per rating.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub separate: Option<bool>,

    /// Number of page crawler threads.
    #[arg(long, short = 'p', value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub page_workers: Option<u32>,

    /// Number of image downloader threads.
    #[arg(long, short = 'd', value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub download_workers: Option<u32>,

    /// Crawl yande.re instead of konachan.com.
    #[arg(long, short = 'y', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub yandere: Option<bool>,

    /// Discard an unfinished job instead of resuming it.
    #[arg(long)]
    pub fresh: bool,

    /// Show a download counter.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub progress: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

impl Cli {
    /// Mode requested on the command line, if any. Resuming is decided by the handler.
    pub fn requested_mode(&self) -> Option<CrawlMode> {
        if self.update {
            Some(CrawlMode::Update)
        } else if self.all {
            Some(CrawlMode::All)
        } else {
            self.pages.map(CrawlMode::Pages)
        }
    }

    /// True if any of `-s`, `-q`, `-e` was passed.
    pub fn any_rating_flag(&self) -> bool {
        self.safe.is_some() || self.questionable.is_some() || self.explicit.is_some()
    }
}
