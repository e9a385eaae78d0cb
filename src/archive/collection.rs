//! Recursive traversal of an archiver tree into a flat, filtered entry list.
//!
//! Three modes share one shape (list, exclude, optional single-archive expansion, filter,
//! descend): [`EntryCollection::collect`] gathers everything for a book's page list,
//! [`EntryCollection::first_one`] finds a cover, [`EntryCollection::select`] locates one entry.
//! Every archiver and temp file created on the way is owned by the collection's [`TrashBox`]
//! until [`EntryCollection::dispose`] (or drop).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use super::archiver::Archiver;
use super::entry::ArchiveEntry;
use super::filesystem::ArchiveFileSystem;
use super::nested::{FindOpts, find_nested, list_entries, open_child_archiver};
use super::services::ArchiveServices;
use super::trash::TrashBox;
use crate::error::{Error, check_cancelled};
use crate::{CollectOpts, Result};

pub struct EntryCollection {
    path: PathBuf,
    opts: CollectOpts,
    services: ArchiveServices,
    trash: TrashBox,
    root: Option<Arc<dyn Archiver>>,
    effective_root: Option<Arc<dyn Archiver>>,
    collection: Vec<ArchiveEntry>,
    skipped_archive_count: usize,
    disposed: bool,
}

impl EntryCollection {
    /// Nothing is opened until the first traversal call.
    pub fn new(services: ArchiveServices, path: &Path, opts: CollectOpts) -> Self {
        Self {
            path: path.to_path_buf(),
            opts,
            services,
            trash: TrashBox::new(),
            root: None,
            effective_root: None,
            collection: Vec::new(),
            skipped_archive_count: 0,
            disposed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Result of the last traversal call.
    pub fn collection(&self) -> &[ArchiveEntry] {
        &self.collection
    }

    /// Archives seen but not expanded by the last traversal: recursion off, depth limit, or
    /// unsupported/corrupt. Callers use it to offer "expand subfolders?".
    pub fn skipped_archive_count(&self) -> usize {
        self.skipped_archive_count
    }

    /// System path of the archiver the last traversal actually started from. Differs from
    /// [`Self::path`] after single-archive expansion.
    pub fn effective_root(&self) -> Option<&Path> {
        self.effective_root.as_ref().map(|a| a.system_path())
    }

    /// Number of resources currently owned.
    pub fn owned_resource_count(&self) -> usize {
        self.trash.len()
    }

    /// All mode: every qualifying entry, recursing into sub-archives when enabled.
    pub fn collect(&mut self, token: &CancellationToken) -> Result<Vec<ArchiveEntry>> {
        let start = self.start(token)?;
        let mut out = Vec::new();
        self.collect_from(&start, 0, token, &mut out)?;
        debug!(
            "collected {} entries from {} ({} archive(s) skipped)",
            out.len(),
            self.path.display(),
            self.skipped_archive_count
        );
        self.collection = out.clone();
        Ok(out)
    }

    /// FirstOne mode: the first image in name order, searching sub-archives in name order only
    /// when a level has no image. Empty when nothing qualifies.
    pub fn first_one(&mut self, token: &CancellationToken) -> Result<Vec<ArchiveEntry>> {
        let start = self.start(token)?;
        let found = self.first_from(&start, 0, token)?;
        self.collection = found.into_iter().collect();
        Ok(self.collection.clone())
    }

    /// Select mode: one entry by name relative to the collection root (or by full system
    /// path under it), descending into the narrowest matching nested archive.
    pub fn select(&mut self, entry_name: &str, token: &CancellationToken) -> Result<Vec<ArchiveEntry>> {
        self.skipped_archive_count = 0;
        let root = self.root(token)?;
        self.effective_root = Some(Arc::clone(&root));
        let target = self.relative_target(entry_name);
        let opts = FindOpts {
            max_depth: self.opts.max_depth,
            allow_pre_extract: self.opts.allow_pre_extract,
            apply_exclusion: true,
        };
        let found = find_nested(&self.services, &root, &target, opts, &mut self.trash, token)?;
        self.collection = found.into_iter().collect();
        Ok(self.collection.clone())
    }

    /// Release every archiver and temp file created so far. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.collection.clear();
        self.root = None;
        self.effective_root = None;
        self.trash.clean_up();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Root archiver, opened once and owned by the trash box.
    fn root(&mut self, token: &CancellationToken) -> Result<Arc<dyn Archiver>> {
        if self.disposed {
            return Err(Error::Disposed {
                path: self.path.clone(),
            });
        }
        if let Some(root) = &self.root {
            return Ok(Arc::clone(root));
        }
        check_cancelled(token)?;
        let allow = self.opts.allow_pre_extract;
        let path = self.path.clone();
        let unsupported = || Error::UnsupportedArchive { path: path.clone() };
        let root = if path.is_dir() {
            let archiver = self.services.manager.create_archiver(&path, None, allow)?;
            self.trash.add_archiver(Arc::clone(&archiver));
            archiver
        } else {
            let fs = ArchiveFileSystem::new(self.services.clone(), self.opts.max_depth);
            let entry = fs.resolve_into(&path, allow, &mut self.trash, token)?;
            if !entry.is_archive() {
                return Err(unsupported());
            }
            open_child_archiver(&self.services, &entry, allow, &mut self.trash, token)?
                .ok_or_else(unsupported)?
        };
        self.root = Some(Arc::clone(&root));
        Ok(root)
    }

    /// Root, after single-archive expansion when it applies. Resets the skipped counter.
    fn start(&mut self, token: &CancellationToken) -> Result<Arc<dyn Archiver>> {
        self.skipped_archive_count = 0;
        let root = self.root(token)?;
        let start = if !self.opts.recursive && self.opts.auto_single_archive {
            self.expand_single_archive(root, token)?
        } else {
            root
        };
        self.effective_root = Some(Arc::clone(&start));
        Ok(start)
    }

    /// While a level holds exactly one entry and it is an archive, descend into it.
    fn expand_single_archive(
        &mut self,
        archiver: Arc<dyn Archiver>,
        token: &CancellationToken,
    ) -> Result<Arc<dyn Archiver>> {
        let mut current = archiver;
        for _ in 0..self.opts.max_depth {
            let entries = list_entries(&self.services, &current, true, token)?;
            let [only] = entries.as_slice() else {
                break;
            };
            if !only.is_archive() {
                break;
            }
            match open_child_archiver(
                &self.services,
                only,
                self.opts.allow_pre_extract,
                &mut self.trash,
                token,
            )? {
                Some(child) => {
                    debug!("auto-expanding single archive {}", only.system_path().display());
                    current = child;
                }
                None => break,
            }
        }
        Ok(current)
    }

    fn collect_from(
        &mut self,
        archiver: &Arc<dyn Archiver>,
        depth: usize,
        token: &CancellationToken,
        out: &mut Vec<ArchiveEntry>,
    ) -> Result<()> {
        check_cancelled(token)?;
        let mut entries = list_entries(&self.services, archiver, true, token)?;
        if !self.opts.all_entries {
            entries.retain(|e| e.is_archive() || e.is_image());
        }
        for entry in entries {
            if !entry.is_archive() {
                out.push(entry);
                continue;
            }
            if !self.opts.recursive || depth >= self.opts.max_depth {
                self.skipped_archive_count += 1;
                continue;
            }
            // Collect into a scratch list so a child that fails halfway adds nothing.
            let mut child_out = Vec::new();
            let result = self.open_child(&entry, token).and_then(|child| match child {
                Some(child) => self
                    .collect_from(&child, depth + 1, token, &mut child_out)
                    .map(|()| true),
                None => Ok(false),
            });
            match result {
                Ok(true) => out.append(&mut child_out),
                Ok(false) => self.skipped_archive_count += 1,
                Err(e) => self.skip_or_propagate(&entry, e)?,
            }
        }
        Ok(())
    }

    fn first_from(
        &mut self,
        archiver: &Arc<dyn Archiver>,
        depth: usize,
        token: &CancellationToken,
    ) -> Result<Option<ArchiveEntry>> {
        check_cancelled(token)?;
        let mut entries = list_entries(&self.services, archiver, true, token)?;
        entries.retain(|e| e.is_archive() || e.is_image());
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        if let Some(image) = entries.iter().find(|e| e.is_image()) {
            return Ok(Some(image.clone()));
        }
        let archives: Vec<ArchiveEntry> = entries.into_iter().filter(|e| e.is_archive()).collect();
        if depth >= self.opts.max_depth {
            self.skipped_archive_count += archives.len();
            return Ok(None);
        }
        let fan_out = self.opts.max_fan_out.min(archives.len());
        self.skipped_archive_count += archives.len() - fan_out;
        for entry in archives.iter().take(fan_out) {
            let result = self.open_child(entry, token).and_then(|child| match child {
                Some(child) => self.first_from(&child, depth + 1, token).map(Some),
                None => Ok(None),
            });
            match result {
                Ok(Some(Some(found))) => return Ok(Some(found)),
                Ok(Some(None)) => {}
                Ok(None) => self.skipped_archive_count += 1,
                Err(e) => self.skip_or_propagate(entry, e)?,
            }
        }
        Ok(None)
    }

    fn open_child(
        &mut self,
        entry: &ArchiveEntry,
        token: &CancellationToken,
    ) -> Result<Option<Arc<dyn Archiver>>> {
        open_child_archiver(
            &self.services,
            entry,
            self.opts.allow_pre_extract,
            &mut self.trash,
            token,
        )
    }

    /// Per-entry failures are counted and skipped; cancellation always propagates.
    fn skip_or_propagate(&mut self, entry: &ArchiveEntry, err: Error) -> Result<()> {
        if err.is_cancelled() {
            return Err(err);
        }
        warn!("skipping {}: {err}", entry.system_path().display());
        self.skipped_archive_count += 1;
        Ok(())
    }

    fn relative_target(&self, entry_name: &str) -> String {
        match Path::new(entry_name).strip_prefix(&self.path) {
            Ok(rest) if !rest.as_os_str().is_empty() => rest
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            _ => entry_name.replace('\\', "/"),
        }
    }
}

impl Drop for EntryCollection {
    fn drop(&mut self) {
        self.dispose();
    }
}
