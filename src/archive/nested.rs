//! Descending across archive boundaries: opening child archivers and walking a `/` path
//! through nested archives. Shared by [`EntryCollection`](super::EntryCollection) and
//! [`ArchiveFileSystem`](super::ArchiveFileSystem).

use std::sync::Arc;

use log::debug;
use tokio_util::sync::CancellationToken;

use super::archiver::{Archiver, get_entries};
use super::entry::ArchiveEntry;
use super::services::ArchiveServices;
use super::trash::TrashBox;
use crate::Result;
use crate::error::{Error, check_cancelled};

/// List `archiver`, dropping excluded entries when `apply_exclusion` is set.
pub fn list_entries(
    services: &ArchiveServices,
    archiver: &Arc<dyn Archiver>,
    apply_exclusion: bool,
    token: &CancellationToken,
) -> Result<Vec<ArchiveEntry>> {
    check_cancelled(token)?;
    let mut entries = get_entries(archiver, token)?;
    if apply_exclusion {
        entries.retain(|e| !services.exclude.is_excluded_path(e.name()));
    }
    Ok(entries)
}

/// Open the archiver that expands `entry`.
///
/// File-system entries are opened in place. Archive-internal entries are extracted to a temp
/// file first; the temp file goes into `trash` before the archiver is created, and the archiver
/// goes into `trash` before it is probed. Returns `Ok(None)` when the result is not a supported
/// archive; anything created so far is still owned by `trash`.
pub fn open_child_archiver(
    services: &ArchiveServices,
    entry: &ArchiveEntry,
    allow_pre_extract: bool,
    trash: &mut TrashBox,
    token: &CancellationToken,
) -> Result<Option<Arc<dyn Archiver>>> {
    check_cancelled(token)?;
    let source = match entry.fs_path() {
        Some(path) => path,
        None => {
            let temp = services.extractor.extract_raw(entry, token)?;
            let path = temp.to_path_buf();
            trash.add_temp_file(temp);
            path
        }
    };
    let archiver = match services
        .manager
        .create_archiver(&source, Some(entry), allow_pre_extract)
    {
        Ok(archiver) => archiver,
        Err(Error::UnsupportedArchive { path }) => {
            debug!("no archiver for {}", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    trash.add_archiver(Arc::clone(&archiver));
    if !archiver.is_supported() {
        debug!("unsupported archive {}", entry.system_path().display());
        archiver.dispose();
        return Ok(None);
    }
    Ok(Some(archiver))
}

/// True when `name` is a whole-segment prefix of `target` (`a.zip` of `a.zip/p.jpg`).
pub fn is_entry_prefix(name: &str, target: &str) -> bool {
    target.len() > name.len()
        && target.starts_with(name)
        && target.as_bytes()[name.len()] == b'/'
}

/// Locate `target` (a `/`-separated name relative to `archiver`). An exact match wins;
/// otherwise the longest archive entry prefixing `target` is opened and the remainder is
/// searched inside it, at most `max_depth` archive boundaries deep.
pub fn find_nested(
    services: &ArchiveServices,
    archiver: &Arc<dyn Archiver>,
    target: &str,
    opts: FindOpts,
    trash: &mut TrashBox,
    token: &CancellationToken,
) -> Result<Option<ArchiveEntry>> {
    let mut archiver = Arc::clone(archiver);
    let mut target = target.trim_matches('/').to_string();
    for depth in 0..=opts.max_depth {
        check_cancelled(token)?;
        let entries = list_entries(services, &archiver, opts.apply_exclusion, token)?;
        if let Some(found) = entries.iter().find(|e| e.name() == target) {
            return Ok(Some(found.clone()));
        }
        let Some(best) = entries
            .iter()
            .filter(|e| e.is_archive() && is_entry_prefix(e.name(), &target))
            .max_by_key(|e| e.name().len())
        else {
            return Ok(None);
        };
        if depth == opts.max_depth {
            debug!(
                "depth limit {} reached at {}",
                opts.max_depth,
                best.system_path().display()
            );
            return Ok(None);
        }
        let rest = target[best.name().len() + 1..].to_string();
        match open_child_archiver(services, best, opts.allow_pre_extract, trash, token)? {
            Some(child) => {
                archiver = child;
                target = rest;
            }
            None => return Ok(None),
        }
    }
    Ok(None)
}

#[derive(Clone, Copy, Debug)]
pub struct FindOpts {
    pub max_depth: usize,
    pub allow_pre_extract: bool,
    pub apply_exclusion: bool,
}
