use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, warn};
use sysinfo::{Pid, System};
use tempfile::{Builder, TempDir};

use crate::Result;
use crate::error::io_context;

/// Prefix of session temp directories and extracted temp files. Matches the package name.
pub const TEMP_FILE_PREFIX: &str = concat!(env!("CARGO_PKG_NAME"), "-");

/// Leftovers older than this are assumed to belong to a crashed session.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// File inside a session directory holding the owning process id.
pub const SESSION_OWNER_FILE: &str = ".owner";

fn temp_parent(parent: Option<&Path>) -> PathBuf {
    parent.map_or_else(std::env::temp_dir, Path::to_path_buf)
}

/// Create the per-session directory extracted sub-archives go into. Removed when the returned
/// [`TempDir`] is dropped.
pub fn create_session_temp_dir(parent: Option<&Path>) -> Result<TempDir> {
    let parent = temp_parent(parent);
    fs::create_dir_all(&parent)
        .map_err(io_context(format!("create temp parent {}", parent.display())))?;
    let dir = Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .tempdir_in(&parent)
        .map_err(io_context(format!("create session temp dir in {}", parent.display())))?;
    let owner = dir.path().join(SESSION_OWNER_FILE);
    fs::write(&owner, std::process::id().to_string())
        .map_err(io_context(format!("write {}", owner.display())))?;
    debug!("session temp dir: {}", dir.path().display());
    Ok(dir)
}

/// Remove `nestbox-*` files and directories under `parent` older than [`STALE_TEMP_AGE`].
/// Returns how many were removed. Failures are logged and skipped.
pub fn remove_stale_temp_dirs(parent: Option<&Path>) -> usize {
    remove_temp_dirs_older_than(parent, STALE_TEMP_AGE)
}

/// Like [`remove_stale_temp_dirs`] with an explicit age. Session directories whose owner
/// process is still running are kept whatever their age.
pub fn remove_temp_dirs_older_than(parent: Option<&Path>, max_age: Duration) -> usize {
    let parent = temp_parent(parent);
    let Ok(read_dir) = fs::read_dir(&parent) else {
        return 0;
    };
    let now = SystemTime::now();
    // Process table, loaded only once an owned candidate shows up.
    let mut processes: Option<System> = None;
    let mut removed = 0;
    for entry in read_dir.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(TEMP_FILE_PREFIX) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let is_stale = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .is_some_and(|age| age >= max_age);
        if !is_stale {
            continue;
        }
        let path = entry.path();
        if meta.is_dir()
            && let Some(pid) = session_owner(&path)
        {
            let system = processes.get_or_insert_with(System::new_all);
            if system.process(Pid::from_u32(pid)).is_some() {
                debug!("keeping {} (owner {pid} still running)", path.display());
                continue;
            }
        }
        let result = if meta.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => {
                debug!("removed stale temp {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("failed to remove stale temp {}: {e}", path.display()),
        }
    }
    removed
}

fn session_owner(dir: &Path) -> Option<u32> {
    fs::read_to_string(dir.join(SESSION_OWNER_FILE))
        .ok()?
        .trim()
        .parse()
        .ok()
}
