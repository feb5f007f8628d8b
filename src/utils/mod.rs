pub mod config;
pub mod konadl_toml;
pub mod logger;
pub mod tempfiles;

pub use config::*;
pub use konadl_toml::{KonadlToml, load_konadl_toml};
pub use logger::setup_logging;
pub use tempfiles::{part_path_for, remove_if_exists, stage_sibling, write_atomically};
