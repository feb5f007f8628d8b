//! CLI command handler: resume a paused job if there is one, otherwise start the requested crawl.

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::sync::Arc;

use crate::engine::arg_parser::Cli;
use crate::site::MoebooruSite;
use crate::utils::{load_konadl_toml, setup_logging};
use crate::{
    CancelToken, CheckpointManager, CrawlError, CrawlMode, CrawlReport, RatingSet, RunConfig,
    SiteVariant,
};

/// Build the run config: defaults, then `.konadl.toml`, then CLI flags.
fn setup_config(cli: &Cli) -> RunConfig {
    let file = load_konadl_toml(&cli.storage);
    setup_logging(
        cli.verbose
            .or_else(|| file.as_ref().and_then(|f| f.verbose()))
            .unwrap_or(false),
    );

    let mut config = RunConfig::new(&cli.storage);
    if let Some(file) = &file {
        file.apply_to(&mut config);
    }
    if cli.any_rating_flag() {
        config.ratings = RatingSet::new(
            cli.safe.unwrap_or(false),
            cli.questionable.unwrap_or(false),
            cli.explicit.unwrap_or(false),
        );
    }
    if let Some(separate) = cli.separate {
        config.separate_by_rating = separate;
    }
    if let Some(n) = cli.page_workers {
        config.page_workers = n as usize;
    }
    if let Some(n) = cli.download_workers {
        config.download_workers = n as usize;
    }
    if let Some(yandere) = cli.yandere {
        config.site = if yandere {
            SiteVariant::Alternate
        } else {
            SiteVariant::Primary
        };
    }
    if let Some(progress) = cli.progress {
        config.show_progress = progress;
    }
    config
}

/// Decide what this invocation does. A paused job always wins unless `--fresh` is given.
fn choose_mode(cli: &Cli, checkpoints: &CheckpointManager) -> Result<CrawlMode> {
    let requested = cli.requested_mode();
    if cli.fresh {
        checkpoints.remove_checkpoints()?;
        // Update runs need the stored newest id.
        if requested != Some(CrawlMode::Update) {
            checkpoints.remove_metadata()?;
        }
    } else if checkpoints.checkpoints_exist() {
        if requested.is_some() {
            warn!("Found an unfinished job; resuming it. Use --fresh to discard it.");
        }
        return Ok(CrawlMode::Resume);
    }
    match requested {
        Some(mode) => Ok(mode),
        None => bail!("Nothing to do: pass --pages N, --all or --update"),
    }
}

/// Run one job for the parsed command line. Returns true if the job finished, false if it
/// was paused.
pub fn handle_run(cli: &Cli) -> Result<bool> {
    let config = setup_config(cli);
    if !config.storage_root.is_dir() {
        return Err(CrawlError::StorageMissing(config.storage_root.clone()).into());
    }
    if config.ratings.is_empty() {
        warn!("No ratings enabled; every post will be skipped");
    }

    let checkpoints = CheckpointManager::new(&config.storage_root);
    let mode = choose_mode(cli, &checkpoints)?;
    debug!("Mode: {:?}", mode);

    let site = MoebooruSite::new(config.site)
        .with_context(|| format!("Failed to set up client for {}", config.site.root_url()))?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupted. Saving progress, please wait...");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;

    let report = crate::crawl(config, Arc::new(site), mode, cancel)?;
    log_summary(&report);
    Ok(report.done)
}

/// Final summary line for a report.
fn log_summary(report: &CrawlReport) {
    if report.done {
        info!("Job done.");
    } else {
        info!("Job paused. Run again with the same storage directory to resume.");
    }
    info!(
        "Downloaded {} images in {:.2}s",
        report.downloads,
        report.elapsed.as_secs_f64()
    );
}
