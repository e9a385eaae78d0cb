//! Error type shared by the job engine and the archive resolver.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::job::JobPriority;

#[derive(Debug, Error)]
pub enum Error {
    /// Path or entry could not be resolved through any archive nesting.
    /// Carries the path exactly as the caller passed it.
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Cooperative cancellation observed. Not a failure at the worker boundary.
    #[error("operation cancelled")]
    Cancelled,

    #[error("unsupported or corrupt archive: {}", path.display())]
    UnsupportedArchive { path: PathBuf },

    #[error("archiver already disposed: {}", path.display())]
    Disposed { path: PathBuf },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("zip {}: {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("worker size {requested} out of range (max {max})")]
    InvalidWorkerSize { requested: usize, max: usize },

    #[error("job #{serial} ({priority:?}) faulted: {message}")]
    JobFault {
        serial: u64,
        priority: JobPriority,
        message: String,
    },

    #[error("config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(path: impl AsRef<Path>) -> Self {
        Error::NotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// `.map_err(io_context(...))` helper so io errors keep the path that failed.
pub fn io_context(context: impl Into<String>) -> impl FnOnce(io::Error) -> Error {
    let context = context.into();
    move |source| Error::Io { context, source }
}

/// Bail out with [`Error::Cancelled`] when the token is set. Called at every recursion frontier.
pub fn check_cancelled(token: &tokio_util::sync::CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}
