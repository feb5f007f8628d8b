//! konadl CLI: download images from konachan.com or yande.re; Ctrl+C pauses, rerun resumes.

use anyhow::Result;
use clap::Parser;
use konadl::engine::arg_parser::Cli;
use konadl::engine::handle_run;
use std::process::ExitCode;
use std::time::Instant;

fn main() -> Result<ExitCode> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    let done = handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    // 2: job paused, rerun to resume
    Ok(if done {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
