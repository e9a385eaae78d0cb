//! Folder-backed archiver: one directory level, subdirectories reported as expandable entries.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::archiver::Archiver;
use super::entry::{EntryClassifier, EntryFlags, EntryInfo, join_entry_name};
use crate::Result;
use crate::error::{Error, check_cancelled, io_context};

#[derive(Debug)]
pub struct FolderArchiver {
    path: PathBuf,
    classifier: Arc<EntryClassifier>,
    disposed: AtomicBool,
}

impl FolderArchiver {
    pub fn new(path: &Path, classifier: Arc<EntryClassifier>) -> Self {
        Self {
            path: path.to_path_buf(),
            classifier,
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed {
                path: self.path.clone(),
            });
        }
        Ok(())
    }
}

impl Archiver for FolderArchiver {
    fn system_path(&self) -> &Path {
        &self.path
    }

    fn source_path(&self) -> &Path {
        &self.path
    }

    fn is_file_system(&self) -> bool {
        true
    }

    fn is_supported(&self) -> bool {
        self.path.is_dir()
    }

    fn read_entries(&self, token: &CancellationToken) -> Result<Vec<EntryInfo>> {
        self.ensure_alive()?;
        if !self.path.is_dir() {
            return Err(Error::not_found(&self.path));
        }
        let mut entries = Vec::new();
        for result in WalkDir::new(&self.path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            check_cancelled(token)?;
            let dir_entry = match result {
                Ok(e) => e,
                Err(err) => {
                    warn!("skipping unreadable entry in {}: {err}", self.path.display());
                    continue;
                }
            };
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            let meta = match dir_entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warn!("skipping {}: {err}", dir_entry.path().display());
                    continue;
                }
            };
            let mtime_ns = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_nanos() as i64)
                .unwrap_or(0);
            let flags = if meta.is_dir() {
                EntryFlags {
                    is_archive: true,
                    is_image: false,
                    is_directory: true,
                    is_file_system: true,
                }
            } else {
                self.classifier.file_flags(&name, true)
            };
            entries.push(EntryInfo {
                name,
                flags,
                size: if meta.is_dir() { 0 } else { meta.len() },
                mtime_ns,
            });
        }
        Ok(entries)
    }

    fn extract_to_file(&self, entry_name: &str, dest: &Path) -> Result<()> {
        self.ensure_alive()?;
        let src = join_entry_name(&self.path, entry_name);
        fs::copy(&src, dest).map_err(io_context(format!(
            "copy {} -> {}",
            src.display(),
            dest.display()
        )))?;
        Ok(())
    }

    fn open_entry(&self, entry_name: &str) -> Result<Box<dyn Read + Send>> {
        self.ensure_alive()?;
        let src = join_entry_name(&self.path, entry_name);
        let file = File::open(&src).map_err(io_context(format!("open {}", src.display())))?;
        Ok(Box::new(file))
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
