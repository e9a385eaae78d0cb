//! The archiver abstraction consumed by traversal and path resolution.

use std::fmt::Debug;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::entry::{ArchiveEntry, EntryInfo};
use crate::Result;

/// A container over a concrete archive file or a folder.
///
/// Created on demand by an [`ArchiverManager`](super::ArchiverManager) and owned by exactly one
/// [`TrashBox`](super::TrashBox), which calls [`Archiver::dispose`] once at clean-up.
pub trait Archiver: Debug + Send + Sync {
    /// Hybrid path identifying this archiver (what the user sees), e.g.
    /// `/books/outer.zip/inner.zip` for an archive nested in another.
    fn system_path(&self) -> &Path;

    /// Path actually opened on disk. Differs from [`Self::system_path`] when the archiver
    /// reads a temp file extracted from a parent archive.
    fn source_path(&self) -> &Path;

    /// True for folder-backed archivers; their entries are real files.
    fn is_file_system(&self) -> bool;

    /// Capability check. An unsupported archiver is discarded by the caller.
    fn is_supported(&self) -> bool;

    /// Entries in archive order.
    fn read_entries(&self, token: &CancellationToken) -> Result<Vec<EntryInfo>>;

    fn extract_to_file(&self, entry_name: &str, dest: &Path) -> Result<()>;

    fn open_entry(&self, entry_name: &str) -> Result<Box<dyn Read + Send>>;

    /// Release handles. Must be idempotent.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

/// List `archiver` and tie every entry to it.
pub fn get_entries(
    archiver: &Arc<dyn Archiver>,
    token: &CancellationToken,
) -> Result<Vec<ArchiveEntry>> {
    Ok(archiver
        .read_entries(token)?
        .into_iter()
        .map(|info| ArchiveEntry::new(Arc::clone(archiver), info))
        .collect())
}
