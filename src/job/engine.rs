//! Bounded worker pool over one shared priority queue.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::Receiver;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use super::context::{JobContext, JobEvent, JobFault};
use super::priority::JobPriority;
use super::request::JobRequest;
use super::worker::JobWorker;
use crate::utils::config::JobWorkerLimits;
use crate::{Error, Result};

/// Owns the worker threads. Constructed explicitly and handed to whoever submits work.
///
/// Faults raised by jobs are queued on [`Self::faults`]; the owning thread is expected to poll
/// [`Self::check_faults`] and treat an `Err` as fatal.
pub struct JobEngine {
    context: Arc<JobContext>,
    faults: Receiver<JobFault>,
    max_workers: usize,
}

impl JobEngine {
    /// Engine with `worker_size` workers and the default upper bound from [`JobWorkerLimits`].
    pub fn new(worker_size: usize) -> Result<Self> {
        Self::with_max_workers(worker_size, JobWorkerLimits::current().max_workers)
    }

    pub fn with_max_workers(worker_size: usize, max_workers: usize) -> Result<Self> {
        let (context, faults) = JobContext::new();
        let engine = Self {
            context,
            faults,
            max_workers,
        };
        engine.change_worker_size(worker_size)?;
        Ok(engine)
    }

    /// Submit work. Returns immediately with the job's handle.
    pub fn add<A, C>(&self, action: A, cancel_action: Option<C>, priority: JobPriority) -> JobRequest
    where
        A: FnOnce(&CancellationToken) -> Result<()> + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        self.submit(action, cancel_action, priority, false)
    }

    /// Like [`Self::add`] but inserted at the head of its level.
    pub fn add_to_front<A, C>(
        &self,
        action: A,
        cancel_action: Option<C>,
        priority: JobPriority,
    ) -> JobRequest
    where
        A: FnOnce(&CancellationToken) -> Result<()> + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        self.submit(action, cancel_action, priority, true)
    }

    fn submit<A, C>(
        &self,
        action: A,
        cancel_action: Option<C>,
        priority: JobPriority,
        to_front: bool,
    ) -> JobRequest
    where
        A: FnOnce(&CancellationToken) -> Result<()> + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let cancel_action = cancel_action.map(|c| Box::new(c) as super::request::CancelAction);
        self.context
            .add(Box::new(action), cancel_action, priority, to_front)
    }

    pub fn change_priority(&self, request: &JobRequest, priority: JobPriority) -> bool {
        self.context.change_priority(request.serial(), priority)
    }

    pub fn worker_size(&self) -> usize {
        self.context.lock().workers.len()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Grow or shrink the pool to `size` workers. Retired workers finish their current job
    /// first. Shrinking to 0 also waits for them to exit.
    pub fn change_worker_size(&self, size: usize) -> Result<()> {
        if size > self.max_workers {
            return Err(Error::InvalidWorkerSize {
                requested: size,
                max: self.max_workers,
            });
        }
        let retired = {
            let mut state = self.context.lock();
            let mut next_id = state.workers.iter().map(|w| w.id() + 1).max().unwrap_or(0);
            while state.workers.len() < size {
                let worker = JobWorker::spawn(next_id, Arc::clone(&self.context))?;
                state.workers.push(worker);
                next_id += 1;
            }
            let retired: Vec<JobWorker> = state.workers.drain(size..).collect();
            for worker in &retired {
                worker.retire();
            }
            retired
        };
        self.context.wake_all();
        if !retired.is_empty() {
            debug!("retiring {} job worker(s), pool now {size}", retired.len());
        }
        if size == 0 {
            let current = thread::current().id();
            for worker in retired {
                if worker.thread_id() != Some(current) {
                    worker.join();
                }
            }
        }
        Ok(())
    }

    pub fn subscribe(&self) -> Receiver<JobEvent> {
        self.context.subscribe()
    }

    pub fn faults(&self) -> &Receiver<JobFault> {
        &self.faults
    }

    /// Re-raise the oldest pending job fault on the calling thread.
    pub fn check_faults(&self) -> Result<()> {
        match self.faults.try_recv() {
            Ok(fault) => Err(fault.into()),
            Err(_) => Ok(()),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.context.pending_count()
    }

    pub fn pending_count_at(&self, priority: JobPriority) -> usize {
        self.context.pending_count_at(priority)
    }

    pub fn busy_count(&self) -> usize {
        self.context.busy_count()
    }

    pub fn is_busy(&self) -> bool {
        self.busy_count() > 0
    }

    /// Stop all workers after their current job, then cancel whatever is still queued.
    pub fn shutdown(self) {
        // Drop does the work.
    }
}

impl Drop for JobEngine {
    fn drop(&mut self) {
        if let Err(e) = self.change_worker_size(0) {
            log::warn!("job engine shutdown: {e}");
        }
        let cancelled = self.context.cancel_pending();
        if cancelled > 0 {
            info!("job engine dropped, cancelled {cancelled} queued job(s)");
        }
    }
}
