//! Entry descriptors produced by archivers.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::archiver::Archiver;
use crate::Result;

/// Capability flags of one entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryFlags {
    pub is_archive: bool,
    pub is_image: bool,
    pub is_directory: bool,
    pub is_file_system: bool,
}

/// What an [`Archiver`] reports for one entry, before it is tied to its archiver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryInfo {
    /// `/`-separated path relative to the archiver.
    pub name: String,
    pub flags: EntryFlags,
    pub size: u64,
    /// Modification time in nanoseconds since epoch.
    pub mtime_ns: i64,
}

/// One addressable item (image, sub-archive, directory, plain file) inside an archiver.
///
/// Immutable once listed. Keeps its archiver alive, but reading from it fails after the
/// owning [`TrashBox`](super::TrashBox) disposed that archiver.
#[derive(Clone)]
pub struct ArchiveEntry {
    archiver: Arc<dyn Archiver>,
    info: EntryInfo,
}

impl ArchiveEntry {
    pub fn new(archiver: Arc<dyn Archiver>, info: EntryInfo) -> Self {
        Self { archiver, info }
    }

    pub fn archiver(&self) -> &Arc<dyn Archiver> {
        &self.archiver
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Last path segment of the entry name.
    pub fn file_name(&self) -> &str {
        self.info
            .name
            .rsplit('/')
            .next()
            .unwrap_or(self.info.name.as_str())
    }

    pub fn info(&self) -> &EntryInfo {
        &self.info
    }

    pub fn flags(&self) -> EntryFlags {
        self.info.flags
    }

    pub fn is_archive(&self) -> bool {
        self.info.flags.is_archive
    }

    pub fn is_image(&self) -> bool {
        self.info.flags.is_image
    }

    pub fn is_directory(&self) -> bool {
        self.info.flags.is_directory
    }

    pub fn is_file_system(&self) -> bool {
        self.info.flags.is_file_system
    }

    pub fn size(&self) -> u64 {
        self.info.size
    }

    pub fn mtime_ns(&self) -> i64 {
        self.info.mtime_ns
    }

    /// Hybrid path: archiver system path joined with the entry name.
    pub fn system_path(&self) -> PathBuf {
        join_entry_name(self.archiver.system_path(), &self.info.name)
    }

    /// Real path on disk, for entries of file-system archivers only.
    pub fn fs_path(&self) -> Option<PathBuf> {
        self.is_file_system()
            .then(|| join_entry_name(self.archiver.source_path(), &self.info.name))
    }

    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        self.archiver.open_entry(&self.info.name)
    }

    pub fn extract_to_file(&self, dest: &Path) -> Result<()> {
        self.archiver.extract_to_file(&self.info.name, dest)
    }

    /// Extension of the entry name including the dot, lowercased (`".zip"`), or empty.
    pub fn extension(&self) -> String {
        extension_of(self.file_name())
    }
}

impl fmt::Debug for ArchiveEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("system_path", &self.system_path())
            .field("flags", &self.info.flags)
            .field("size", &self.info.size)
            .finish()
    }
}

/// Join a `/`-separated entry name onto a base path, segment by segment.
pub fn join_entry_name(base: &Path, name: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for segment in name.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}

/// Lowercased extension with leading dot, or empty when there is none.
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

/// Decides the archive/image flags from a name. Built from configuration.
#[derive(Clone, Debug)]
pub struct EntryClassifier {
    image_extensions: Vec<String>,
    archive_extensions: Vec<String>,
}

impl EntryClassifier {
    pub fn new<I, A>(image_extensions: I, archive_extensions: A) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        Self {
            image_extensions: normalize_extensions(image_extensions),
            archive_extensions: normalize_extensions(archive_extensions),
        }
    }

    pub fn is_image(&self, name: &str) -> bool {
        let ext = extension_of(name);
        !ext.is_empty() && self.image_extensions.contains(&ext)
    }

    pub fn is_archive(&self, name: &str) -> bool {
        let ext = extension_of(name);
        !ext.is_empty() && self.archive_extensions.contains(&ext)
    }

    /// Flags for a file (not a directory) named `name`.
    pub fn file_flags(&self, name: &str, is_file_system: bool) -> EntryFlags {
        EntryFlags {
            is_archive: self.is_archive(name),
            is_image: self.is_image(name),
            is_directory: false,
            is_file_system,
        }
    }
}

impl Default for EntryClassifier {
    fn default() -> Self {
        use crate::utils::config::{DEFAULT_ARCHIVE_EXTENSIONS, DEFAULT_IMAGE_EXTENSIONS};
        Self::new(DEFAULT_IMAGE_EXTENSIONS, DEFAULT_ARCHIVE_EXTENSIONS)
    }
}

fn normalize_extensions<I>(exts: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    exts.into_iter()
        .map(|e| {
            let e = e.as_ref().trim().to_ascii_lowercase();
            if e.starts_with('.') { e } else { format!(".{e}") }
        })
        .collect()
}
