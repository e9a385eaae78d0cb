//! Zip-backed archiver (also `.cbz`). Opens lazily; optionally reads small archives fully into
//! memory up front ("pre-extract") so later entry reads never touch the disk.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

use super::archiver::Archiver;
use super::entry::{EntryClassifier, EntryInfo};
use crate::Result;
use crate::error::{Error, check_cancelled, io_context};

pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

type Zip = ZipArchive<Box<dyn ReadSeek>>;

/// Upper bound on the buffer reserved up front by [`ZipArchiver::open_entry`].
const OPEN_BUFFER_HINT: u64 = 1024 * 1024;

pub struct ZipArchiver {
    system_path: PathBuf,
    source_path: PathBuf,
    classifier: Arc<EntryClassifier>,
    /// Read the whole file into memory when it is at most this many bytes. `None` disables.
    pre_extract_limit: Option<u64>,
    archive: Mutex<Option<Zip>>,
    disposed: AtomicBool,
}

impl ZipArchiver {
    pub fn new(
        source_path: &Path,
        system_path: &Path,
        classifier: Arc<EntryClassifier>,
        pre_extract_limit: Option<u64>,
    ) -> Self {
        Self {
            system_path: system_path.to_path_buf(),
            source_path: source_path.to_path_buf(),
            classifier,
            pre_extract_limit,
            archive: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    fn zip_err(&self) -> impl FnOnce(zip::result::ZipError) -> Error + '_ {
        move |source| Error::Zip {
            path: self.system_path.clone(),
            source,
        }
    }

    fn open_reader(&self) -> Result<Box<dyn ReadSeek>> {
        let ctx = || format!("open {}", self.source_path.display());
        let file = File::open(&self.source_path).map_err(io_context(ctx()))?;
        let len = file.metadata().map_err(io_context(ctx()))?.len();
        match self.pre_extract_limit {
            Some(limit) if len <= limit => {
                debug!("pre-extracting {} ({len} bytes)", self.system_path.display());
                let mut buf = Vec::with_capacity(len as usize);
                BufReader::new(file)
                    .read_to_end(&mut buf)
                    .map_err(io_context(ctx()))?;
                Ok(Box::new(Cursor::new(buf)))
            }
            _ => Ok(Box::new(BufReader::new(file))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Zip>> {
        self.archive.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the open archive, opening it on first use.
    fn with_archive<R>(&self, f: impl FnOnce(&mut Zip) -> Result<R>) -> Result<R> {
        let mut guard = self.lock();
        if self.is_disposed() {
            return Err(Error::Disposed {
                path: self.system_path.clone(),
            });
        }
        if guard.is_none() {
            let reader = self.open_reader()?;
            *guard = Some(ZipArchive::new(reader).map_err(self.zip_err())?);
        }
        let Some(zip) = guard.as_mut() else {
            return Err(Error::Disposed {
                path: self.system_path.clone(),
            });
        };
        f(zip)
    }

    fn source_mtime_ns(&self) -> i64 {
        fs::metadata(&self.source_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
    }
}

impl fmt::Debug for ZipArchiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipArchiver")
            .field("system_path", &self.system_path)
            .field("source_path", &self.source_path)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Archiver for ZipArchiver {
    fn system_path(&self) -> &Path {
        &self.system_path
    }

    fn source_path(&self) -> &Path {
        &self.source_path
    }

    fn is_file_system(&self) -> bool {
        false
    }

    fn is_supported(&self) -> bool {
        self.with_archive(|_| Ok(())).is_ok()
    }

    fn read_entries(&self, token: &CancellationToken) -> Result<Vec<EntryInfo>> {
        // Zip timestamps are DOS local time without zone; the container's mtime is used instead.
        let mtime_ns = self.source_mtime_ns();
        self.with_archive(|zip| {
            let mut entries = Vec::with_capacity(zip.len());
            for i in 0..zip.len() {
                check_cancelled(token)?;
                let file = zip.by_index(i).map_err(self.zip_err())?;
                if file.is_dir() {
                    continue;
                }
                let name = file.name().replace('\\', "/");
                entries.push(EntryInfo {
                    flags: self.classifier.file_flags(&name, false),
                    name,
                    size: file.size(),
                    mtime_ns,
                });
            }
            Ok(entries)
        })
    }

    fn extract_to_file(&self, entry_name: &str, dest: &Path) -> Result<()> {
        self.with_archive(|zip| {
            let mut file = zip.by_name(entry_name).map_err(|e| match e {
                zip::result::ZipError::FileNotFound => {
                    Error::not_found(self.system_path.join(entry_name))
                }
                other => (self.zip_err())(other),
            })?;
            let ctx = || format!("extract {entry_name} -> {}", dest.display());
            let mut out = File::create(dest).map_err(io_context(ctx()))?;
            io::copy(&mut file, &mut out).map_err(io_context(ctx()))?;
            Ok(())
        })
    }

    fn open_entry(&self, entry_name: &str) -> Result<Box<dyn Read + Send>> {
        self.with_archive(|zip| {
            let mut file = zip.by_name(entry_name).map_err(|e| match e {
                zip::result::ZipError::FileNotFound => {
                    Error::not_found(self.system_path.join(entry_name))
                }
                other => (self.zip_err())(other),
            })?;
            // The header size is untrusted; only use it as a bounded hint.
            let mut buf = Vec::with_capacity(file.size().min(OPEN_BUFFER_HINT) as usize);
            file.read_to_end(&mut buf)
                .map_err(io_context(format!("read {entry_name}")))?;
            Ok(Box::new(Cursor::new(buf)) as Box<dyn Read + Send>)
        })
    }

    fn dispose(&self) {
        let mut guard = self.lock();
        if !self.disposed.swap(true, Ordering::AcqRel) {
            *guard = None;
            debug!("disposed {}", self.system_path.display());
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
