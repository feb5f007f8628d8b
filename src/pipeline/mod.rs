//! Pipeline components: shared context, worker pools, retry handling and the run coordinator.

pub mod context;
pub mod downloads;
pub mod error_handler;
pub mod orchestrator;
pub mod pages;
pub mod retry;
pub mod update;

pub use context::{CancelToken, PipelineContext, RunStats};
pub use downloads::{download_to, spawn_download_workers};
pub use error_handler::{ErrorLog, Retried, retry_inline, retry_or_abandon};
pub use orchestrator::Crawler;
pub use pages::{enqueue_accepted, spawn_page_workers};
pub use retry::RetryPolicy;
pub use update::{UpdateScan, crawl_new_images};
