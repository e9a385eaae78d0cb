//! A unit of cancellable work and the handle returned to whoever submitted it.

use std::fmt;
use std::sync::Weak;

use tokio_util::sync::CancellationToken;

use super::context::JobContext;
use super::priority::JobPriority;
use crate::Result;

/// Main body of a job. Long work polls the token and returns [`crate::Error::Cancelled`].
pub type JobAction = Box<dyn FnOnce(&CancellationToken) -> Result<()> + Send + 'static>;

/// Runs instead of the action when the job was cancelled before it started.
pub type CancelAction = Box<dyn FnOnce() + Send + 'static>;

/// Queued work. Owned by the queue until a worker dequeues it.
pub struct Job {
    pub(crate) serial: u64,
    pub(crate) priority: JobPriority,
    pub(crate) action: JobAction,
    pub(crate) cancel_action: Option<CancelAction>,
    pub(crate) token: CancellationToken,
}

impl Job {
    pub(crate) fn new(
        serial: u64,
        priority: JobPriority,
        action: JobAction,
        cancel_action: Option<CancelAction>,
    ) -> Self {
        Self {
            serial,
            priority,
            action,
            cancel_action,
            token: CancellationToken::new(),
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn priority(&self) -> JobPriority {
        self.priority
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("serial", &self.serial)
            .field("priority", &self.priority)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

/// Caller-side handle of a submitted job.
///
/// Holds the job's cancellation token and a weak link to the queue, so it never keeps the
/// engine alive. Cancelling after the job finished does nothing.
#[derive(Clone)]
pub struct JobRequest {
    serial: u64,
    token: CancellationToken,
    context: Weak<JobContext>,
}

impl JobRequest {
    pub(crate) fn new(serial: u64, token: CancellationToken, context: Weak<JobContext>) -> Self {
        Self {
            serial,
            token,
            context,
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token shared with the running job; useful to chain child work.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Move the job to `priority` if it is still queued. Returns false once it was dequeued
    /// or the engine is gone.
    pub fn change_priority(&self, priority: JobPriority) -> bool {
        match self.context.upgrade() {
            Some(context) => context.change_priority(self.serial, priority),
            None => false,
        }
    }
}

impl fmt::Debug for JobRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRequest")
            .field("serial", &self.serial)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
