use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::utils::config::PART_SUFFIX;

/// Sibling path `<name>.<suffix>` used while a file is being written.
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.parent()
        .unwrap_or(Path::new("."))
        .join(format!("{name}.{suffix}"))
}

/// Where unvalidated image bytes for `path` are written.
pub fn part_path_for(path: &Path) -> PathBuf {
    sibling_with_suffix(path, PART_SUFFIX)
}

/// Write `contents` to `<path>.tmp` and sync it, leaving `path` untouched. Returns the temp
/// path; the caller renames it into place. The temp file is removed on error.
pub fn stage_sibling(path: &Path, contents: &[u8]) -> std::io::Result<PathBuf> {
    let temp_path = sibling_with_suffix(path, "tmp");
    let result = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    match result {
        Ok(()) => Ok(temp_path),
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

/// Write `contents` to `<path>.tmp`, sync, then rename over `path`.
/// Readers see either the old file or the complete new one.
pub fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let temp_path = stage_sibling(path, contents)?;
    fs::rename(&temp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })
}

/// Remove `path`, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
