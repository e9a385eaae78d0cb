//! Archiver factory: picks a concrete archiver for a path.

use std::path::Path;
use std::sync::Arc;

use log::debug;

use super::archiver::Archiver;
use super::entry::{ArchiveEntry, EntryClassifier, extension_of};
use super::folder::FolderArchiver;
use super::zip::ZipArchiver;
use crate::Result;
use crate::error::Error;

pub trait ArchiverManager: Send + Sync {
    /// Whether a file with this name/path can be opened as an archive.
    fn is_supported(&self, path: &Path) -> bool;

    /// Open an archiver on the real file or folder at `path`.
    ///
    /// `parent` is the entry this archiver expands, when it comes from another archiver; its
    /// system path becomes the new archiver's identity while `path` may be a temp file.
    fn create_archiver(
        &self,
        path: &Path,
        parent: Option<&ArchiveEntry>,
        allow_pre_extract: bool,
    ) -> Result<Arc<dyn Archiver>>;
}

/// Folders and zip files, classified with one shared [`EntryClassifier`].
pub struct DefaultArchiverManager {
    classifier: Arc<EntryClassifier>,
    pre_extract_limit: u64,
}

impl DefaultArchiverManager {
    pub fn new(classifier: EntryClassifier, pre_extract_limit: u64) -> Self {
        Self {
            classifier: Arc::new(classifier),
            pre_extract_limit,
        }
    }
}

impl Default for DefaultArchiverManager {
    fn default() -> Self {
        Self::new(
            EntryClassifier::default(),
            crate::utils::config::TraversalLimits::PRE_EXTRACT_LIMIT,
        )
    }
}

impl ArchiverManager for DefaultArchiverManager {
    fn is_supported(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| self.classifier.is_archive(n))
    }

    fn create_archiver(
        &self,
        path: &Path,
        parent: Option<&ArchiveEntry>,
        allow_pre_extract: bool,
    ) -> Result<Arc<dyn Archiver>> {
        let system_path = parent.map_or_else(|| path.to_path_buf(), |e| e.system_path());
        if path.is_dir() {
            debug!("folder archiver for {}", system_path.display());
            return Ok(Arc::new(FolderArchiver::new(path, Arc::clone(&self.classifier))));
        }
        // Temp files keep the entry's extension, so the real path decides the format.
        let ext = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(extension_of)
            .unwrap_or_default();
        match ext.as_str() {
            ".zip" | ".cbz" | ".epub" => {
                debug!("zip archiver for {}", system_path.display());
                let limit = allow_pre_extract.then_some(self.pre_extract_limit);
                Ok(Arc::new(ZipArchiver::new(
                    path,
                    &system_path,
                    Arc::clone(&self.classifier),
                    limit,
                )))
            }
            _ => Err(Error::UnsupportedArchive { path: system_path }),
        }
    }
}
