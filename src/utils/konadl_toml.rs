//! Load `.konadl.toml` from the storage directory (CLI only). Library callers build
//! [`RunConfig`](crate::RunConfig) themselves.

use serde::Deserialize;
use std::path::Path;

use crate::utils::config::PackagePaths;
use crate::{RunConfig, SiteVariant};

#[derive(Debug, Default, Deserialize)]
pub struct KonadlToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    safe: Option<bool>,
    questionable: Option<bool>,
    explicit: Option<bool>,
    separate: Option<bool>,
    page_workers: Option<usize>,
    download_workers: Option<usize>,
    yandere: Option<bool>,
    verbose: Option<bool>,
    progress: Option<bool>,
}

/// Load the settings file from `dir` if present. Returns None if missing; warns and returns
/// None if it does not parse.
pub fn load_konadl_toml(dir: &Path) -> Option<KonadlToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    toml::from_str(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

/// Overwrite a config field from the file when present.
macro_rules! apply_file_opt {
    ($section:expr, $target:expr, $field:ident => $($target_field:ident).+) => {
        if let Some(v) = $section.$field {
            $target.$($target_field).+ = v;
        }
    };
}

impl KonadlToml {
    /// Apply file values onto `config` (only fields present in the file). Call before CLI flags.
    pub fn apply_to(&self, config: &mut RunConfig) {
        let s = &self.settings;
        apply_file_opt!(s, config, safe => ratings.safe);
        apply_file_opt!(s, config, questionable => ratings.questionable);
        apply_file_opt!(s, config, explicit => ratings.explicit);
        apply_file_opt!(s, config, separate => separate_by_rating);
        apply_file_opt!(s, config, page_workers => page_workers);
        apply_file_opt!(s, config, download_workers => download_workers);
        apply_file_opt!(s, config, progress => show_progress);
        if let Some(yandere) = s.yandere {
            config.site = if yandere {
                SiteVariant::Alternate
            } else {
                SiteVariant::Primary
            };
        }
    }

    pub fn verbose(&self) -> Option<bool> {
        self.settings.verbose
    }
}
