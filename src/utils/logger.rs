use colored::Colorize;
use env_logger::Builder;
use log::Level;
use std::io::Write;

/// Install the process logger. Each record is written as one line, so worker output never
/// interleaves mid-line.
pub fn setup_logging(verbose: bool) {
    use log::LevelFilter;

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::from_default_env()
        .filter_level(LevelFilter::Warn) // Default: only warnings from dependencies
        .filter_module(env!("CARGO_PKG_NAME"), level) // Our crate: use requested level
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = match record.level() {
                        Level::Warn => "WARN".yellow(),
                        Level::Error => "ERROR".red(),
                        _ => unreachable!(),
                    };
                    let thread = std::thread::current();
                    let origin = thread.name().unwrap_or_else(|| record.target());
                    format!(
                        "[{} {} {}] {}",
                        name.cyan(),
                        level_str,
                        origin.white(),
                        record.args()
                    )
                }
                _ => format!("[{}] {}", name.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init()
        .ok();
}
