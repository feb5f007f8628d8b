//! Output path utilities

use std::fs;
use std::path::PathBuf;

use crate::{CrawlError, DownloadJob, Rating, RunConfig};

/// File name for an image URL: the last path segment with `%20` turned into `_` and the
/// `_-_` separators collapsed to `_`. None when the segment is empty, `.` or `..`.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let last = url.rsplit('/').next().unwrap_or(url);
    let name = last.replace("%20", "_").replace("_-_", "_");
    match name.as_str() {
        "" | "." | ".." => None,
        _ => Some(name),
    }
}

/// Directory images of `rating` go to.
pub fn output_dir(config: &RunConfig, rating: Rating) -> PathBuf {
    if config.separate_by_rating {
        config.storage_root.join(rating.as_str())
    } else {
        config.storage_root.clone()
    }
}

/// Final path of the image for `job`, always a file inside its output directory.
pub fn output_path(config: &RunConfig, job: &DownloadJob) -> Option<PathBuf> {
    file_name_from_url(&job.url).map(|name| output_dir(config, job.rating).join(name))
}

/// Check the storage directory exists and create rating subdirectories when separating.
pub fn prepare_storage(config: &RunConfig) -> Result<(), CrawlError> {
    if !config.storage_root.is_dir() {
        return Err(CrawlError::StorageMissing(config.storage_root.clone()));
    }
    if config.separate_by_rating {
        for rating in config.ratings.enabled() {
            let dir = output_dir(config, rating);
            fs::create_dir_all(&dir).map_err(|e| CrawlError::io(&dir, e))?;
        }
    }
    Ok(())
}
