//! Shared state between the engine and its workers: one lock over the queue and the worker
//! list, one condition variable as the wake signal, and add/remove notifications.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error};

use super::priority::JobPriority;
use super::queue::PriorityQueue;
use super::request::{CancelAction, Job, JobAction, JobRequest};
use super::worker::JobWorker;
use crate::Error;

/// How a dequeued job ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Cancelled before start (cancel action ran) or the action returned `Cancelled`.
    Cancelled,
    Faulted,
}

/// Diagnostics stream, e.g. for a busy indicator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobEvent {
    Added {
        serial: u64,
        priority: JobPriority,
    },
    Removed {
        serial: u64,
        priority: JobPriority,
        outcome: JobOutcome,
    },
}

/// A job that failed with something other than cancellation. Delivered to the thread that owns
/// the engine; see [`crate::job::JobEngine::check_faults`].
#[derive(Clone, Debug)]
pub struct JobFault {
    pub serial: u64,
    pub priority: JobPriority,
    pub message: String,
}

impl From<JobFault> for Error {
    fn from(f: JobFault) -> Self {
        Error::JobFault {
            serial: f.serial,
            priority: f.priority,
            message: f.message,
        }
    }
}

/// Everything guarded by the context lock.
pub(crate) struct ContextState {
    pub queue: PriorityQueue<Job>,
    pub workers: Vec<JobWorker>,
}

pub struct JobContext {
    state: Mutex<ContextState>,
    wake: Condvar,
    next_serial: AtomicU64,
    busy: AtomicUsize,
    subscribers: Mutex<Vec<Sender<JobEvent>>>,
    fault_tx: Sender<JobFault>,
}

impl JobContext {
    /// New context and the receiving end of its fault channel.
    pub fn new() -> (Arc<Self>, Receiver<JobFault>) {
        let (fault_tx, fault_rx) = unbounded();
        let context = Arc::new(Self {
            state: Mutex::new(ContextState {
                queue: PriorityQueue::new(),
                workers: Vec::new(),
            }),
            wake: Condvar::new(),
            next_serial: AtomicU64::new(1),
            busy: AtomicUsize::new(0),
            subscribers: Mutex::new(Vec::new()),
            fault_tx,
        });
        (context, fault_rx)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wait<'a>(
        &self,
        guard: MutexGuard<'a, ContextState>,
    ) -> MutexGuard<'a, ContextState> {
        self.wake
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake every idle worker. Callers change the wait predicate under the lock first.
    pub(crate) fn wake_all(&self) {
        self.wake.notify_all();
    }

    /// Enqueue a job and signal one idle worker. Never waits on job execution.
    pub fn add(
        self: &Arc<Self>,
        action: JobAction,
        cancel_action: Option<CancelAction>,
        priority: JobPriority,
        to_front: bool,
    ) -> JobRequest {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let job = Job::new(serial, priority, action, cancel_action);
        let request = JobRequest::new(serial, job.token.clone(), Arc::downgrade(self));
        self.busy.fetch_add(1, Ordering::AcqRel);
        {
            let mut state = self.lock();
            state.queue.enqueue(job, priority, to_front);
            // Still under the lock so `Added` always precedes the matching `Removed`.
            self.notify(JobEvent::Added { serial, priority });
        }
        self.wake.notify_one();
        debug!("job #{serial} added at {priority:?}");
        request
    }

    /// Move a still-queued job to `priority`. Same lock as dequeue, so it is atomic with it.
    pub fn change_priority(&self, serial: u64, priority: JobPriority) -> bool {
        let mut state = self.lock();
        match state
            .queue
            .change_priority_by(|job| job.serial == serial, priority, false)
        {
            Some(job) => {
                debug!("job #{serial} moved {:?} -> {priority:?}", job.priority);
                job.priority = priority;
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().queue.count()
    }

    pub fn pending_count_at(&self, priority: JobPriority) -> usize {
        self.lock().queue.count_at(priority)
    }

    /// Jobs submitted and not yet finished (queued or executing).
    pub fn busy_count(&self) -> usize {
        self.busy.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> Receiver<JobEvent> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Called by a worker after a dequeued job ended, whatever the outcome.
    pub(crate) fn job_removed(&self, serial: u64, priority: JobPriority, outcome: JobOutcome) {
        self.busy.fetch_sub(1, Ordering::AcqRel);
        self.notify(JobEvent::Removed {
            serial,
            priority,
            outcome,
        });
    }

    /// Empty the queue, cancelling every job still in it: its token is cancelled, its cancel
    /// action runs and a `Removed { Cancelled }` is emitted. Returns how many were dropped.
    pub(crate) fn cancel_pending(&self) -> usize {
        let jobs = self.lock().queue.clear();
        let count = jobs.len();
        for job in jobs {
            let Job {
                serial,
                priority,
                cancel_action,
                token,
                ..
            } = job;
            token.cancel();
            if let Some(cancel_action) = cancel_action
                && catch_unwind(AssertUnwindSafe(cancel_action)).is_err()
            {
                error!("job #{serial} ({priority:?}): cancel action panicked");
            }
            self.job_removed(serial, priority, JobOutcome::Cancelled);
        }
        count
    }

    pub(crate) fn raise_fault(&self, fault: JobFault) {
        error!(
            "job #{} ({:?}) faulted: {}",
            fault.serial, fault.priority, fault.message
        );
        // The engine holds the receiver for its whole lifetime; a send can only fail during teardown.
        let _ = self.fault_tx.send(fault);
    }

    fn notify(&self, event: JobEvent) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
