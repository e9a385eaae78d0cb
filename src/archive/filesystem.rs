//! Resolve a hybrid path (real filesystem segments followed by archive-internal segments) to
//! one entry.

use std::ops::Deref;
use std::path::{Component, Path};
use std::sync::Arc;

use log::debug;
use tokio_util::sync::CancellationToken;

use super::entry::ArchiveEntry;
use super::nested::{FindOpts, find_nested, list_entries};
use super::services::ArchiveServices;
use super::trash::TrashBox;
use crate::Result;
use crate::error::{Error, check_cancelled};

/// A resolved entry together with the archivers and temp files that keep it readable.
#[derive(Debug)]
pub struct ResolvedEntry {
    entry: ArchiveEntry,
    trash: TrashBox,
}

impl ResolvedEntry {
    pub fn entry(&self) -> &ArchiveEntry {
        &self.entry
    }
}

impl Deref for ResolvedEntry {
    type Target = ArchiveEntry;

    fn deref(&self) -> &ArchiveEntry {
        &self.entry
    }
}

pub struct ArchiveFileSystem {
    services: ArchiveServices,
    max_depth: usize,
}

impl ArchiveFileSystem {
    pub fn new(services: ArchiveServices, max_depth: usize) -> Self {
        Self {
            services,
            max_depth,
        }
    }

    /// Resolve `path` to an entry that owns everything created on the way.
    /// Fails with [`Error::NotFound`] carrying `path` when any component cannot be resolved.
    pub fn create_archive_entry(
        &self,
        path: &Path,
        allow_pre_extract: bool,
        token: &CancellationToken,
    ) -> Result<ResolvedEntry> {
        let mut trash = TrashBox::new();
        let entry = self.resolve_into(path, allow_pre_extract, &mut trash, token)?;
        Ok(ResolvedEntry { entry, trash })
    }

    /// Like [`Self::create_archive_entry`], registering created resources in the caller's box.
    pub fn resolve_into(
        &self,
        path: &Path,
        allow_pre_extract: bool,
        trash: &mut TrashBox,
        token: &CancellationToken,
    ) -> Result<ArchiveEntry> {
        check_cancelled(token)?;
        let not_found = || Error::not_found(path);

        let real = path
            .ancestors()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
            .ok_or_else(not_found)?;

        if real == path {
            return self.file_system_entry(path, allow_pre_extract, trash, token);
        }
        if !real.is_file() || !self.services.manager.is_supported(real) {
            debug!("{} is not an archive", real.display());
            return Err(not_found());
        }
        let rest = inner_name(path, real).ok_or_else(not_found)?;

        let archiver = match self
            .services
            .manager
            .create_archiver(real, None, allow_pre_extract)
        {
            Ok(a) => a,
            Err(Error::UnsupportedArchive { .. }) => return Err(not_found()),
            Err(e) => return Err(e),
        };
        trash.add_archiver(Arc::clone(&archiver));
        if !archiver.is_supported() {
            archiver.dispose();
            return Err(not_found());
        }

        let opts = FindOpts {
            max_depth: self.max_depth,
            allow_pre_extract,
            apply_exclusion: false,
        };
        find_nested(&self.services, &archiver, &rest, opts, trash, token)?.ok_or_else(not_found)
    }

    /// Entry for a path that exists on disk, listed through its parent folder.
    fn file_system_entry(
        &self,
        path: &Path,
        allow_pre_extract: bool,
        trash: &mut TrashBox,
        token: &CancellationToken,
    ) -> Result<ArchiveEntry> {
        let not_found = || Error::not_found(path);
        let name = path.file_name().ok_or_else(not_found)?.to_string_lossy();
        let parent = match path.parent() {
            Some(p) if p.as_os_str().is_empty() => Path::new("."),
            Some(p) => p,
            None => return Err(not_found()),
        };
        let folder = self
            .services
            .manager
            .create_archiver(parent, None, allow_pre_extract)?;
        trash.add_archiver(Arc::clone(&folder));
        list_entries(&self.services, &folder, false, token)?
            .into_iter()
            .find(|e| e.name() == name)
            .ok_or_else(not_found)
    }
}

/// `path` below `real` as a `/`-separated entry name.
fn inner_name(path: &Path, real: &Path) -> Option<String> {
    let rest = path.strip_prefix(real).ok()?;
    let segments: Vec<String> = rest
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    (!segments.is_empty()).then(|| segments.join("/"))
}
