//! nestbox: prioritized background jobs and nested archive entry resolution.
//!
//! - [`job`]: a priority work queue drained by a bounded pool of worker threads, with
//!   cooperative cancellation through [`CancellationToken`](tokio_util::sync::CancellationToken).
//! - [`archive`]: traversal of folders and archives nested inside archives, extracting
//!   sub-archives to temp files on demand and releasing them through a [`TrashBox`].

pub mod archive;
pub mod cli;
pub mod error;
pub mod job;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use archive::{
    ArchiveEntry, ArchiveFileSystem, ArchiveServices, Archiver, ArchiverManager, EntryCollection,
    Extractor, PathExclusion, ResolvedEntry, TrashBox,
};
pub use error::{Error, Result};
pub use job::{JobEngine, JobEvent, JobFault, JobOutcome, JobPriority, JobRequest};

use std::path::Path;

use log::debug;
use tokio_util::sync::CancellationToken;

/// List the images under `path` (folder, archive, or hybrid path into an archive) with
/// default services built from `opts`. Resources are released before returning.
pub fn collect_entries(
    path: &Path,
    opts: &Opts,
    token: &CancellationToken,
) -> Result<Vec<ArchiveEntry>> {
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    let services = ArchiveServices::from_opts(opts)?;
    let mut collection = EntryCollection::new(services, path, opts.collect);
    let entries = collection.collect(token)?;
    collection.dispose();
    Ok(entries)
}
