//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// `.nestbox.toml`
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Path segments excluded from traversal by default (OS metadata folders).
    pub fn default_exclude_patterns(&self) -> Vec<String> {
        DEFAULT_EXCLUDE_PATTERNS
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

// ---- Job workers ----

/// Bounds for the job worker pool.
/// Use [`JobWorkerLimits::current()`] to derive `max_workers` from rayon's thread count.
#[derive(Clone, Copy, Debug)]
pub struct JobWorkerLimits {
    /// Upper bound accepted by `JobEngine::change_worker_size`.
    pub max_workers: usize,
}

impl Default for JobWorkerLimits {
    fn default() -> Self {
        Self {
            max_workers: Self::MIN_MAX_WORKERS,
        }
    }
}

impl JobWorkerLimits {
    /// Workers started by default.
    pub const DEFAULT_WORKERS: usize = 2;
    /// `max_workers` never drops below this, even on single-core machines.
    pub const MIN_MAX_WORKERS: usize = 4;

    /// Limits with `max_workers` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            max_workers: rayon::current_num_threads().max(Self::MIN_MAX_WORKERS),
        }
    }
}

// ---- Traversal ----

/// Bounds for nested archive traversal.
pub struct TraversalLimits;

impl TraversalLimits {
    /// Max archive boundaries crossed by collect, first-one and select.
    pub const MAX_DEPTH: usize = 8;
    /// Max archives tried per level when looking for a first image.
    pub const MAX_FAN_OUT: usize = 16;
    /// Archive files up to this size may be read fully into memory (bytes). 32 MB.
    pub const PRE_EXTRACT_LIMIT: u64 = 32 * 1024 * 1024;
}

// ---- Classification ----

pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "png", "gif", "bmp", "webp", "avif", "jxl", "tif", "tiff", "ico",
];

pub const DEFAULT_ARCHIVE_EXTENSIONS: &[&str] = &["zip", "cbz"];

pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &["__MACOSX", ".DS_Store", "Thumbs.db"];
