//! One execution loop pulling jobs from the shared context.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use log::{debug, trace};
use tokio_util::sync::CancellationToken;

use super::context::{JobContext, JobFault, JobOutcome};
use super::priority::JobPriority;
use super::request::Job;
use crate::Result;
use crate::error::{Error, io_context};

/// Handle to a running worker thread. The token is the worker's lifetime, not a job's.
pub struct JobWorker {
    id: usize,
    lifetime: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl JobWorker {
    pub(crate) fn spawn(id: usize, context: Arc<JobContext>) -> Result<Self> {
        let lifetime = CancellationToken::new();
        let token = lifetime.clone();
        let handle = thread::Builder::new()
            .name(format!("job-worker-{id}"))
            .spawn(move || worker_loop(id, &context, &token))
            .map_err(io_context(format!("spawn job worker {id}")))?;
        debug!("job worker {id} started");
        Ok(Self {
            id,
            lifetime,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn thread_id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|h| h.thread().id())
    }

    /// Ask the loop to exit after its current job. Caller must wake the context afterwards.
    pub(crate) fn retire(&self) {
        self.lifetime.cancel();
    }

    /// Wait for the loop to exit.
    pub(crate) fn join(mut self) {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("job worker {} panicked outside a job", self.id);
        }
    }
}

/// Idle (wait on wake signal) -> Executing -> Idle, until the lifetime token is cancelled.
fn worker_loop(id: usize, context: &JobContext, lifetime: &CancellationToken) {
    loop {
        let job = {
            let mut state = context.lock();
            loop {
                if lifetime.is_cancelled() {
                    debug!("job worker {id} stopped");
                    return;
                }
                if let Some(job) = state.queue.dequeue_any() {
                    break job;
                }
                state = context.wait(state);
            }
        };
        execute(id, context, job);
    }
}

fn execute(id: usize, context: &JobContext, job: Job) {
    let Job {
        serial,
        priority,
        action,
        cancel_action,
        token,
    } = job;

    let outcome = if token.is_cancelled() {
        trace!("worker {id}: job #{serial} cancelled before start");
        if let Some(cancel_action) = cancel_action
            && let Err(panic) = catch_unwind(AssertUnwindSafe(cancel_action))
        {
            fault(context, serial, priority, panic_message(panic.as_ref()));
        }
        JobOutcome::Cancelled
    } else {
        trace!("worker {id}: job #{serial} ({priority:?}) executing");
        match catch_unwind(AssertUnwindSafe(|| action(&token))) {
            Ok(Ok(())) => JobOutcome::Completed,
            Ok(Err(Error::Cancelled)) => JobOutcome::Cancelled,
            Ok(Err(err)) => {
                fault(context, serial, priority, err.to_string());
                JobOutcome::Faulted
            }
            Err(panic) => {
                fault(context, serial, priority, panic_message(panic.as_ref()));
                JobOutcome::Faulted
            }
        }
    };
    context.job_removed(serial, priority, outcome);
}

fn fault(context: &JobContext, serial: u64, priority: JobPriority, message: String) {
    context.raise_fault(JobFault {
        serial,
        priority,
        message,
    });
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
