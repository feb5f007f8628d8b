//! Checkpoint files: pending queue contents and run metadata, kept in the storage directory.
//!
//! - `download_queue.progress`: one `<url>|<page>|<rating>` record per line
//! - `post_queue.progress`: one page number per line
//! - `metadata.progress`: TOML with `[RATINGS]`, `[STATISTICS]` and `[UPDATING]` tables
//!
//! Every file is written to a temp sibling and renamed into place.

use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::queue::WorkQueue;
use crate::utils::config::PackagePaths;
use crate::utils::{remove_if_exists, stage_sibling, write_atomically};
use crate::{CrawlError, DownloadJob, PageJob, PostId, RatingSet, RunMetadata};

/// Encode one download job as a queue-file line (including the newline).
pub fn encode_download_record(job: &DownloadJob) -> String {
    format!("{}|{}|{}\n", job.url, job.page, job.rating)
}

/// Parse one line of `download_queue.progress`. Fields are split from the right, so a `|`
/// inside the url survives.
pub fn parse_download_record(line: &str) -> Result<DownloadJob, String> {
    let mut fields = line.rsplitn(3, '|');
    let (Some(rating), Some(page), Some(url)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(format!("expected 3 fields, found {}", line.split('|').count()));
    };
    if url.is_empty() {
        return Err("empty url".to_string());
    }
    Ok(DownloadJob {
        url: url.to_string(),
        page: parse_page_number(page)?,
        rating: rating.parse()?,
    })
}

/// Parse one line of `post_queue.progress`.
pub fn parse_page_record(line: &str) -> Result<PageJob, String> {
    Ok(PageJob {
        page: parse_page_number(line)?,
    })
}

fn parse_page_number(s: &str) -> Result<u32, String> {
    match s.trim().parse::<u32>() {
        Ok(0) => Err("page numbers start at 1".to_string()),
        Ok(page) => Ok(page),
        Err(_) => Err(format!("page number '{s}' is not numeric")),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataFile {
    #[serde(rename = "RATINGS")]
    ratings: RatingsSection,
    #[serde(rename = "STATISTICS")]
    statistics: StatisticsSection,
    #[serde(rename = "UPDATING", default)]
    updating: UpdatingSection,
}

#[derive(Debug, Serialize, Deserialize)]
struct RatingsSection {
    safe: u8,
    questionable: u8,
    explicit: u8,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatisticsSection {
    total_downloads: u64,
    time_elapsed: f64,
    #[serde(default)]
    job_done: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UpdatingSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_newest_id: Option<String>,
}

impl From<&RunMetadata> for MetadataFile {
    fn from(meta: &RunMetadata) -> Self {
        // A finished job has nothing left to resume, so its progress counters restart at zero.
        let (total_downloads, time_elapsed) = if meta.job_done {
            (0, 0.0)
        } else {
            (
                meta.total_downloads,
                (meta.elapsed_secs * 1e5).round() / 1e5,
            )
        };
        MetadataFile {
            ratings: RatingsSection {
                safe: meta.ratings.safe.into(),
                questionable: meta.ratings.questionable.into(),
                explicit: meta.ratings.explicit.into(),
            },
            statistics: StatisticsSection {
                total_downloads,
                time_elapsed,
                job_done: meta.job_done,
            },
            updating: UpdatingSection {
                previous_newest_id: meta.previous_newest_id.as_ref().map(|id| id.to_string()),
            },
        }
    }
}

/// Reads and writes the checkpoint files of one storage directory.
#[derive(Clone, Debug)]
pub struct CheckpointManager {
    storage: PathBuf,
}

impl CheckpointManager {
    pub fn new(storage: impl Into<PathBuf>) -> Self {
        Self {
            storage: storage.into(),
        }
    }

    pub fn download_queue_path(&self) -> PathBuf {
        PackagePaths::get().download_queue_in(&self.storage)
    }

    pub fn page_queue_path(&self) -> PathBuf {
        PackagePaths::get().page_queue_in(&self.storage)
    }

    pub fn metadata_path(&self) -> PathBuf {
        PackagePaths::get().metadata_in(&self.storage)
    }

    /// True if both queue files are present.
    pub fn checkpoints_exist(&self) -> bool {
        self.download_queue_path().is_file() && self.page_queue_path().is_file()
    }

    pub fn metadata_exists(&self) -> bool {
        self.metadata_path().is_file()
    }

    /// Drain both queues into their checkpoint files. Afterwards both queues are empty and
    /// their jobs exist only on disk. Returns `(pages, downloads)` saved.
    ///
    /// Call only after every worker consuming the queues has exited. Both files are staged
    /// before either is renamed into place; if staging fails neither checkpoint file changes
    /// and the drained jobs are pushed back.
    pub fn save_queues(
        &self,
        pages: &WorkQueue<PageJob>,
        downloads: &WorkQueue<DownloadJob>,
    ) -> Result<(usize, usize), CrawlError> {
        info!("Saving progress to {}", self.storage.display());
        let download_jobs = downloads.drain();
        let page_jobs = pages.drain();
        let targets = [
            (
                self.download_queue_path(),
                download_jobs.iter().map(encode_download_record).collect::<String>(),
            ),
            (
                self.page_queue_path(),
                page_jobs.iter().map(|job| format!("{}\n", job.page)).collect(),
            ),
        ];

        let mut staged = Vec::with_capacity(targets.len());
        for (path, records) in &targets {
            match stage_sibling(path, records.as_bytes()) {
                Ok(temp) => staged.push((temp, path)),
                Err(e) => {
                    for (temp, _) in &staged {
                        let _ = remove_if_exists(temp);
                    }
                    download_jobs.into_iter().for_each(|job| downloads.push(job));
                    page_jobs.into_iter().for_each(|job| pages.push(job));
                    return Err(CrawlError::io(path, e));
                }
            }
        }
        for (temp, path) in staged {
            fs::rename(&temp, path).map_err(|e| CrawlError::io(path, e))?;
        }
        Ok((page_jobs.len(), download_jobs.len()))
    }

    /// Rebuild both queues from the checkpoint files, preserving record order.
    /// Any malformed record is a [`CrawlError::FaultyCheckpoint`].
    pub fn load_queues(
        &self,
    ) -> Result<(WorkQueue<PageJob>, WorkQueue<DownloadJob>), CrawlError> {
        info!("Loading progress from {}", self.storage.display());
        let downloads = read_records(&self.download_queue_path(), parse_download_record)?;
        let pages = read_records(&self.page_queue_path(), parse_page_record)?;
        Ok((WorkQueue::from_jobs(pages), WorkQueue::from_jobs(downloads)))
    }

    /// Write run metadata. A finished job (`job_done`) is stored with zeroed statistics.
    pub fn save_metadata(&self, meta: &RunMetadata) -> Result<(), CrawlError> {
        let text = toml::to_string(&MetadataFile::from(meta))?;
        let path = self.metadata_path();
        write_atomically(&path, text.as_bytes()).map_err(|e| CrawlError::io(path, e))
    }

    pub fn load_metadata(&self) -> Result<RunMetadata, CrawlError> {
        let path = self.metadata_path();
        let text = fs::read_to_string(&path).map_err(|e| CrawlError::io(&path, e))?;
        let file: MetadataFile = toml::from_str(&text).map_err(|e| {
            let line = e
                .span()
                .map(|span| text[..span.start.min(text.len())].matches('\n').count() + 1)
                .unwrap_or(0);
            faulty(&path, line, e.message().to_string())
        })?;

        let flag = |name: &str, value: u8| match value {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(faulty(&path, 0, format!("{name} must be 0 or 1, found {other}"))),
        };
        let elapsed_secs = file.statistics.time_elapsed;
        if !elapsed_secs.is_finite() || Duration::try_from_secs_f64(elapsed_secs).is_err() {
            return Err(faulty(
                &path,
                0,
                format!("time_elapsed must be a non-negative number of seconds, not {elapsed_secs}"),
            ));
        }
        Ok(RunMetadata {
            ratings: RatingSet::new(
                flag("safe", file.ratings.safe)?,
                flag("questionable", file.ratings.questionable)?,
                flag("explicit", file.ratings.explicit)?,
            ),
            total_downloads: file.statistics.total_downloads,
            elapsed_secs,
            previous_newest_id: file
                .updating
                .previous_newest_id
                .filter(|id| !id.is_empty())
                .map(PostId::new),
            job_done: file.statistics.job_done,
        })
    }

    pub fn load_metadata_if_present(&self) -> Result<Option<RunMetadata>, CrawlError> {
        if self.metadata_exists() {
            self.load_metadata().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Remove both queue files. Missing files are fine.
    pub fn remove_checkpoints(&self) -> Result<(), CrawlError> {
        for path in [self.download_queue_path(), self.page_queue_path()] {
            remove_if_exists(&path).map_err(|e| CrawlError::io(&path, e))?;
        }
        Ok(())
    }

    pub fn remove_metadata(&self) -> Result<(), CrawlError> {
        let path = self.metadata_path();
        remove_if_exists(&path).map_err(|e| CrawlError::io(path, e))
    }
}

fn faulty(path: &Path, line: usize, reason: String) -> CrawlError {
    CrawlError::FaultyCheckpoint {
        path: path.to_path_buf(),
        line,
        reason,
    }
}

/// Parse every non-blank line of `path` with `parse`, failing on the first bad record.
fn read_records<T>(
    path: &Path,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Vec<T>, CrawlError> {
    let text = fs::read_to_string(path).map_err(|e| CrawlError::io(path, e))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| parse(line).map_err(|reason| faulty(path, idx + 1, reason)))
        .collect()
}
