//! Background job scheduling: priority queue, worker pool, cooperative cancellation.

pub mod context;
pub mod engine;
pub mod priority;
pub mod queue;
pub mod request;
pub mod worker;

pub use context::{JobContext, JobEvent, JobFault, JobOutcome};
pub use engine::JobEngine;
pub use priority::JobPriority;
pub use queue::PriorityQueue;
pub use request::{CancelAction, Job, JobAction, JobRequest};
pub use worker::JobWorker;
