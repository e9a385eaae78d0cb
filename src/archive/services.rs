//! The collaborators a traversal consumes, bundled and passed explicitly.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use super::entry::EntryClassifier;
use super::extract::{Extractor, TempExtractor};
use super::manager::{ArchiverManager, DefaultArchiverManager};
use crate::{Opts, Result};
use crate::utils::exclude::ExcludeFilter;
use crate::utils::tempfiles::create_session_temp_dir;

/// Configured exclusion rule, e.g. `__MACOSX` folders.
pub trait PathExclusion: Send + Sync {
    /// True when any `/`-separated segment of `path` is excluded.
    fn is_excluded_path(&self, path: &str) -> bool;
}

#[derive(Clone)]
pub struct ArchiveServices {
    pub manager: Arc<dyn ArchiverManager>,
    pub extractor: Arc<dyn Extractor>,
    pub exclude: Arc<dyn PathExclusion>,
    /// Keeps the session temp directory alive while any clone exists.
    temp_dir: Option<Arc<TempDir>>,
}

impl ArchiveServices {
    pub fn new(
        manager: Arc<dyn ArchiverManager>,
        extractor: Arc<dyn Extractor>,
        exclude: Arc<dyn PathExclusion>,
    ) -> Self {
        Self {
            manager,
            extractor,
            exclude,
            temp_dir: None,
        }
    }

    /// Default folder/zip manager, temp-file extractor in a fresh session directory, and the
    /// configured exclusion patterns.
    pub fn from_opts(opts: &Opts) -> Result<Self> {
        let classifier = EntryClassifier::new(&opts.image_extensions, &opts.archive_extensions);
        let manager = DefaultArchiverManager::new(classifier, opts.pre_extract_limit);
        let temp_dir = create_session_temp_dir(opts.temp_dir.as_deref())?;
        let extractor = TempExtractor::new(temp_dir.path());
        let exclude = ExcludeFilter::new(&opts.exclude);
        Ok(Self {
            manager: Arc::new(manager),
            extractor: Arc::new(extractor),
            exclude: Arc::new(exclude),
            temp_dir: Some(Arc::new(temp_dir)),
        })
    }

    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref().map(TempDir::path)
    }
}
