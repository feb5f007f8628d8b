//! Engine module: command line, progress display and output paths

pub mod arg_parser;
pub mod cli;
pub mod progress;
pub mod tools;

pub use arg_parser::Cli;
pub use cli::handle_run;
pub use tools::{file_name_from_url, output_dir, output_path, prepare_storage};
