//! Shared fixtures: zip builders and counting collaborators.
#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use nestbox::archive::{
    ArchiveEntry, ArchiveServices, Archiver, ArchiverManager, DefaultArchiverManager,
    EntryClassifier, EntryInfo, TempExtractor,
};
use nestbox::utils::ExcludeFilter;
use nestbox::utils::config::TraversalLimits;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zip archive bytes holding `entries` as stored (uncompressed) files.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, zip_bytes(entries)).unwrap();
    path.to_path_buf()
}

pub fn write_file(path: &Path, data: &[u8]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut f = File::create(path).unwrap();
    f.write_all(data).unwrap();
    path.to_path_buf()
}

/// Zip nested `depth` levels deep: level_0.zip > level_1.zip > ... > `images` at the bottom.
pub fn nested_zip_bytes(depth: usize, images: &[(&str, &[u8])]) -> Vec<u8> {
    let mut bytes = zip_bytes(images);
    for level in (1..depth).rev() {
        let name = format!("level_{level}.zip");
        bytes = zip_bytes(&[(name.as_str(), bytes.as_slice())]);
    }
    bytes
}

/// Created/disposed tallies shared by a [`CountingManager`] and its archivers.
#[derive(Debug, Default)]
pub struct Counts {
    pub created: AtomicUsize,
    pub disposed: AtomicUsize,
}

impl Counts {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Wraps a real archiver and counts its first disposal.
#[derive(Debug)]
pub struct CountingArchiver {
    inner: Arc<dyn Archiver>,
    counts: Arc<Counts>,
    disposed: AtomicBool,
}

impl Archiver for CountingArchiver {
    fn system_path(&self) -> &Path {
        self.inner.system_path()
    }

    fn source_path(&self) -> &Path {
        self.inner.source_path()
    }

    fn is_file_system(&self) -> bool {
        self.inner.is_file_system()
    }

    fn is_supported(&self) -> bool {
        self.inner.is_supported()
    }

    fn read_entries(&self, token: &CancellationToken) -> nestbox::Result<Vec<EntryInfo>> {
        self.inner.read_entries(token)
    }

    fn extract_to_file(&self, entry_name: &str, dest: &Path) -> nestbox::Result<()> {
        self.inner.extract_to_file(entry_name, dest)
    }

    fn open_entry(&self, entry_name: &str) -> nestbox::Result<Box<dyn Read + Send>> {
        self.inner.open_entry(entry_name)
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.counts.disposed.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Default manager whose archivers report creation and disposal to [`Counts`].
/// Optionally cancels `cancel_after` once that many archivers exist.
pub struct CountingManager {
    inner: DefaultArchiverManager,
    pub counts: Arc<Counts>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl CountingManager {
    pub fn new() -> Self {
        Self {
            inner: DefaultArchiverManager::default(),
            counts: Arc::new(Counts::default()),
            cancel_after: None,
        }
    }

    pub fn cancelling_after(created: usize, token: CancellationToken) -> Self {
        Self {
            cancel_after: Some((created, token)),
            ..Self::new()
        }
    }
}

impl ArchiverManager for CountingManager {
    fn is_supported(&self, path: &Path) -> bool {
        self.inner.is_supported(path)
    }

    fn create_archiver(
        &self,
        path: &Path,
        parent: Option<&ArchiveEntry>,
        allow_pre_extract: bool,
    ) -> nestbox::Result<Arc<dyn Archiver>> {
        let inner = self.inner.create_archiver(path, parent, allow_pre_extract)?;
        let created = self.counts.created.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.cancel_after
            && created >= *limit
        {
            token.cancel();
        }
        Ok(Arc::new(CountingArchiver {
            inner,
            counts: Arc::clone(&self.counts),
            disposed: AtomicBool::new(false),
        }))
    }
}

/// Services over `manager`, extracting into `temp_dir`, excluding `__MACOSX`.
pub fn services_with(manager: Arc<dyn ArchiverManager>, temp_dir: &Path) -> ArchiveServices {
    ArchiveServices::new(
        manager,
        Arc::new(TempExtractor::new(temp_dir)),
        Arc::new(ExcludeFilter::new(&["__MACOSX"])),
    )
}

pub fn default_services(temp_dir: &Path) -> ArchiveServices {
    let manager = DefaultArchiverManager::new(
        EntryClassifier::default(),
        TraversalLimits::PRE_EXTRACT_LIMIT,
    );
    services_with(Arc::new(manager), temp_dir)
}

/// Entry names, for order-sensitive assertions.
pub fn names(entries: &[ArchiveEntry]) -> Vec<String> {
    entries.iter().map(|e| e.name().to_string()).collect()
}

/// Number of files left in `dir`.
pub fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).map(|rd| rd.count()).unwrap_or(0)
}
