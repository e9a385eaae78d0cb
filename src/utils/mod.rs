pub mod config;
pub mod exclude;
pub mod logger;
pub mod nestbox_toml;
pub mod tempfiles;

pub use config::*;
pub use exclude::{ExcludeFilter, glob_match};
pub use logger::setup_logging;
pub use tempfiles::{
    TEMP_FILE_PREFIX, create_session_temp_dir, remove_stale_temp_dirs, remove_temp_dirs_older_than,
};
