//! Public option types for the job engine, traversal and CLI.

use std::path::PathBuf;

use serde::Serialize;

use crate::archive::ArchiveEntry;
use crate::utils::config::{
    DEFAULT_ARCHIVE_EXTENSIONS, DEFAULT_IMAGE_EXTENSIONS, JobWorkerLimits, PackagePaths,
    TraversalLimits,
};

/// Traversal options for [`EntryCollection`](crate::archive::EntryCollection).
#[derive(Clone, Copy, Debug)]
pub struct CollectOpts {
    /// Descend into nested archives and folders.
    pub recursive: bool,
    /// When not recursive, open a lone archive and treat it as the root (repeatable).
    pub auto_single_archive: bool,
    /// Keep every entry instead of only images and archives.
    pub all_entries: bool,
    /// Max archive boundaries crossed by any traversal mode.
    pub max_depth: usize,
    /// Max archives tried per level when searching for a first image.
    pub max_fan_out: usize,
    /// Let archivers read small archive files fully into memory.
    pub allow_pre_extract: bool,
}

impl Default for CollectOpts {
    fn default() -> Self {
        Self {
            recursive: false,
            auto_single_archive: true,
            all_entries: false,
            max_depth: TraversalLimits::MAX_DEPTH,
            max_fan_out: TraversalLimits::MAX_FAN_OUT,
            allow_pre_extract: false,
        }
    }
}

/// Full runtime options: defaults, then `.nestbox.toml`, then CLI flags.
#[derive(Clone, Debug)]
pub struct Opts {
    /// Job worker thread count.
    pub workers: usize,
    pub collect: CollectOpts,
    /// Excluded path segments (glob syntax, e.g. `__MACOSX`, `.*`).
    pub exclude: Vec<String>,
    pub image_extensions: Vec<String>,
    pub archive_extensions: Vec<String>,
    /// Parent of the per-session temp directory. System temp dir when None.
    pub temp_dir: Option<PathBuf>,
    /// Archive files up to this size (bytes) may be read into memory.
    pub pre_extract_limit: u64,
    pub verbose: bool,
    /// Print results as JSON.
    pub json: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            workers: JobWorkerLimits::DEFAULT_WORKERS,
            collect: CollectOpts::default(),
            exclude: PackagePaths::get().default_exclude_patterns(),
            image_extensions: to_strings(DEFAULT_IMAGE_EXTENSIONS),
            archive_extensions: to_strings(DEFAULT_ARCHIVE_EXTENSIONS),
            temp_dir: None,
            pre_extract_limit: TraversalLimits::PRE_EXTRACT_LIMIT,
            verbose: false,
            json: false,
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Serializable view of one [`ArchiveEntry`], for CLI output.
#[derive(Clone, Debug, Serialize)]
pub struct EntryRecord {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub mtime_ns: i64,
    pub is_archive: bool,
    pub is_image: bool,
    pub is_directory: bool,
    pub is_file_system: bool,
}

impl From<&ArchiveEntry> for EntryRecord {
    fn from(e: &ArchiveEntry) -> Self {
        let flags = e.flags();
        Self {
            path: e.system_path(),
            name: e.name().to_string(),
            size: e.size(),
            mtime_ns: e.mtime_ns(),
            is_archive: flags.is_archive,
            is_image: flags.is_image,
            is_directory: flags.is_directory,
            is_file_system: flags.is_file_system,
        }
    }
}
