//! Download counter shown on stderr with `--progress`

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex, PoisonError};

pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a counter for unknown total (shows count without percentage)
pub fn create_counter(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " images"
    )))
}

/// Advance the counter by `n`.
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    let mut bar = pb.lock().unwrap_or_else(PoisonError::into_inner);
    let _ = bar.update(n);
}
