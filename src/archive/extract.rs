//! Extraction service: copies an archive-internal entry out to a temp file.

use std::path::{Path, PathBuf};

use log::debug;
use tempfile::{Builder, TempPath};
use tokio_util::sync::CancellationToken;

use super::entry::ArchiveEntry;
use crate::Result;
use crate::error::{check_cancelled, io_context};
use crate::utils::tempfiles::TEMP_FILE_PREFIX;

pub trait Extractor: Send + Sync {
    /// Stream the raw bytes of `entry` to a new temp file and hand over its ownership.
    /// The file is deleted when the returned [`TempPath`] is dropped or closed.
    fn extract_raw(&self, entry: &ArchiveEntry, token: &CancellationToken) -> Result<TempPath>;
}

/// Writes into one directory, keeping the entry's extension so format detection still works.
pub struct TempExtractor {
    dir: PathBuf,
}

impl TempExtractor {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Extractor for TempExtractor {
    fn extract_raw(&self, entry: &ArchiveEntry, token: &CancellationToken) -> Result<TempPath> {
        check_cancelled(token)?;
        let ext = entry.extension();
        // Dropping `tmp` on a failure below deletes the partial file.
        let tmp = Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .suffix(&ext)
            .tempfile_in(&self.dir)
            .map_err(io_context(format!("create temp file in {}", self.dir.display())))?
            .into_temp_path();
        entry.extract_to_file(&tmp)?;
        check_cancelled(token)?;
        debug!(
            "extracted {} to {}",
            entry.system_path().display(),
            tmp.display()
        );
        Ok(tmp)
    }
}
