//! Nested archive entry resolution: archivers, scoped cleanup, traversal and path resolution.

pub mod archiver;
pub mod collection;
pub mod entry;
pub mod extract;
pub mod filesystem;
pub mod folder;
pub mod manager;
pub mod nested;
pub mod services;
pub mod trash;
pub mod zip;

pub use archiver::{Archiver, get_entries};
pub use collection::EntryCollection;
pub use entry::{ArchiveEntry, EntryClassifier, EntryFlags, EntryInfo};
pub use extract::{Extractor, TempExtractor};
pub use filesystem::{ArchiveFileSystem, ResolvedEntry};
pub use folder::FolderArchiver;
pub use manager::{ArchiverManager, DefaultArchiverManager};
pub use nested::{FindOpts, find_nested, open_child_archiver};
pub use services::{ArchiveServices, PathExclusion};
pub use trash::{TrashBox, TrashItem};
pub use zip::ZipArchiver;
