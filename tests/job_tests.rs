use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use nestbox::job::{JobEngine, JobEvent, JobOutcome, JobPriority};
use nestbox::{Error, Result};
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(5);

fn no_cancel() -> Option<fn()> {
    None
}

/// Poll `cond` until it holds or the timeout passes.
fn wait_until(cond: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < TIMEOUT {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

fn drain<T>(rx: &Receiver<T>, n: usize) -> Vec<T> {
    (0..n).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect()
}

/// Removed events only, in arrival order.
fn removed_outcomes(events: &Receiver<JobEvent>, n: usize) -> Vec<(u64, JobOutcome)> {
    let mut out = Vec::new();
    let start = Instant::now();
    while out.len() < n && start.elapsed() < TIMEOUT {
        if let Ok(JobEvent::Removed {
            serial, outcome, ..
        }) = events.recv_timeout(TIMEOUT)
        {
            out.push((serial, outcome));
        }
    }
    out
}

// --- ordering ---

#[test]
fn test_single_worker_drains_by_precedence_then_fifo() {
    let engine = JobEngine::with_max_workers(0, 4).unwrap();
    let (tx, rx) = unbounded();
    let jobs = [
        ("default-1", JobPriority::Default),
        ("top-1", JobPriority::Top),
        ("default-2", JobPriority::Default),
        ("hi", JobPriority::Hi),
        ("top-2", JobPriority::Top),
    ];
    for (label, priority) in jobs {
        let tx = tx.clone();
        engine.add(
            move |_: &CancellationToken| -> Result<()> {
                tx.send(label).unwrap();
                Ok(())
            },
            no_cancel(),
            priority,
        );
    }
    assert_eq!(engine.pending_count(), 5);
    assert_eq!(engine.pending_count_at(JobPriority::Top), 2);

    engine.change_worker_size(1).unwrap();
    assert_eq!(
        drain(&rx, 5),
        ["top-1", "top-2", "hi", "default-1", "default-2"]
    );
}

#[test]
fn test_add_to_front_runs_before_same_level() {
    let engine = JobEngine::with_max_workers(0, 4).unwrap();
    let (tx, rx) = unbounded();
    for label in ["a", "b"] {
        let tx = tx.clone();
        engine.add(
            move |_: &CancellationToken| -> Result<()> {
                tx.send(label).unwrap();
                Ok(())
            },
            no_cancel(),
            JobPriority::Default,
        );
    }
    let front_tx = tx.clone();
    engine.add_to_front(
        move |_: &CancellationToken| -> Result<()> {
            front_tx.send("front").unwrap();
            Ok(())
        },
        no_cancel(),
        JobPriority::Default,
    );
    engine.change_worker_size(1).unwrap();
    assert_eq!(drain(&rx, 3), ["front", "a", "b"]);
}

#[test]
fn test_change_priority_while_queued() {
    let engine = JobEngine::with_max_workers(0, 4).unwrap();
    let (tx, rx) = unbounded();
    let mut requests = Vec::new();
    for label in ["first", "second"] {
        let tx = tx.clone();
        requests.push(engine.add(
            move |_: &CancellationToken| -> Result<()> {
                tx.send(label).unwrap();
                Ok(())
            },
            no_cancel(),
            JobPriority::Low,
        ));
    }
    assert!(engine.change_priority(&requests[1], JobPriority::Top));
    assert_eq!(engine.pending_count_at(JobPriority::Top), 1);
    assert_eq!(engine.pending_count_at(JobPriority::Low), 1);

    engine.change_worker_size(1).unwrap();
    assert_eq!(drain(&rx, 2), ["second", "first"]);
    // Already executed: nothing left to move.
    assert!(wait_until(|| !engine.is_busy()));
    assert!(!requests[1].change_priority(JobPriority::Hi));
}

#[test]
fn test_serials_are_monotonic() {
    let engine = JobEngine::with_max_workers(0, 4).unwrap();
    let a = engine.add(|_: &CancellationToken| Ok(()), no_cancel(), JobPriority::Low);
    let b = engine.add(|_: &CancellationToken| Ok(()), no_cancel(), JobPriority::Top);
    assert!(b.serial() > a.serial());
}

// --- cancellation ---

#[test]
fn test_cancel_before_start_runs_cancel_action_only() {
    let engine = JobEngine::with_max_workers(0, 4).unwrap();
    let events = engine.subscribe();
    let ran = Arc::new(AtomicBool::new(false));
    let cancelled = Arc::new(AtomicBool::new(false));

    let ran_flag = Arc::clone(&ran);
    let cancel_flag = Arc::clone(&cancelled);
    let request = engine.add(
        move |_: &CancellationToken| -> Result<()> {
            ran_flag.store(true, Ordering::SeqCst);
            Ok(())
        },
        Some(move || cancel_flag.store(true, Ordering::SeqCst)),
        JobPriority::Default,
    );
    request.cancel();
    assert!(request.is_cancellation_requested());
    engine.change_worker_size(1).unwrap();

    let removed = removed_outcomes(&events, 1);
    assert_eq!(removed, [(request.serial(), JobOutcome::Cancelled)]);
    assert!(cancelled.load(Ordering::SeqCst));
    assert!(!ran.load(Ordering::SeqCst));
    assert!(engine.check_faults().is_ok());
}

#[test]
fn test_running_job_observes_cancellation() {
    let engine = JobEngine::with_max_workers(1, 4).unwrap();
    let events = engine.subscribe();
    let (started_tx, started_rx) = unbounded();
    let request = engine.add(
        move |token: &CancellationToken| -> Result<()> {
            started_tx.send(()).unwrap();
            while !token.is_cancelled() {
                thread::sleep(Duration::from_millis(2));
            }
            Err(Error::Cancelled)
        },
        no_cancel(),
        JobPriority::Hi,
    );
    started_rx.recv_timeout(TIMEOUT).unwrap();
    request.cancel();

    let removed = removed_outcomes(&events, 1);
    assert_eq!(removed, [(request.serial(), JobOutcome::Cancelled)]);
    // Cancellation is not a fault.
    assert!(engine.check_faults().is_ok());
}

#[test]
fn test_cancel_after_completion_is_noop() {
    let engine = JobEngine::with_max_workers(1, 4).unwrap();
    let (tx, rx) = unbounded();
    let request = engine.add(
        move |_: &CancellationToken| -> Result<()> {
            tx.send(()).unwrap();
            Ok(())
        },
        no_cancel(),
        JobPriority::Default,
    );
    rx.recv_timeout(TIMEOUT).unwrap();
    assert!(wait_until(|| !engine.is_busy()));
    request.cancel();
    assert!(engine.check_faults().is_ok());
}

// --- faults ---

#[test]
fn test_error_is_surfaced_as_fault_and_worker_survives() {
    let engine = JobEngine::with_max_workers(1, 4).unwrap();
    let failing = engine.add(
        |_: &CancellationToken| -> Result<()> { Err(Error::not_found("missing.zip")) },
        no_cancel(),
        JobPriority::Default,
    );
    let fault = engine.faults().recv_timeout(TIMEOUT).unwrap();
    assert_eq!(fault.serial, failing.serial());
    assert_eq!(fault.priority, JobPriority::Default);
    assert!(fault.message.contains("missing.zip"), "{}", fault.message);

    let (tx, rx) = unbounded();
    engine.add(
        move |_: &CancellationToken| -> Result<()> {
            tx.send(42).unwrap();
            Ok(())
        },
        no_cancel(),
        JobPriority::Default,
    );
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 42);
    assert_eq!(engine.worker_size(), 1);
}

#[test]
fn test_panic_is_surfaced_through_check_faults() {
    let engine = JobEngine::with_max_workers(1, 4).unwrap();
    let events = engine.subscribe();
    let request = engine.add(
        |_: &CancellationToken| -> Result<()> { panic!("page decoder exploded") },
        no_cancel(),
        JobPriority::Top,
    );
    assert_eq!(
        removed_outcomes(&events, 1),
        [(request.serial(), JobOutcome::Faulted)]
    );
    match engine.check_faults() {
        Err(Error::JobFault {
            serial, message, ..
        }) => {
            assert_eq!(serial, request.serial());
            assert!(message.contains("page decoder exploded"), "{message}");
        }
        other => panic!("expected job fault, got {other:?}"),
    }
    assert!(engine.check_faults().is_ok());

    let (tx, rx) = unbounded();
    engine.add(
        move |_: &CancellationToken| -> Result<()> {
            tx.send(()).unwrap();
            Ok(())
        },
        no_cancel(),
        JobPriority::Default,
    );
    assert!(rx.recv_timeout(TIMEOUT).is_ok());
}

// --- worker pool ---

#[test]
fn test_change_worker_size_rejects_above_max() {
    let engine = JobEngine::with_max_workers(1, 3).unwrap();
    assert!(matches!(
        engine.change_worker_size(4),
        Err(Error::InvalidWorkerSize {
            requested: 4,
            max: 3
        })
    ));
    assert_eq!(engine.worker_size(), 1);
    assert!(JobEngine::with_max_workers(5, 2).is_err());
}

#[test]
fn test_resize_grow_and_shrink() {
    let engine = JobEngine::with_max_workers(2, 4).unwrap();
    assert_eq!(engine.worker_size(), 2);
    engine.change_worker_size(4).unwrap();
    assert_eq!(engine.worker_size(), 4);
    engine.change_worker_size(1).unwrap();
    assert_eq!(engine.worker_size(), 1);
    engine.change_worker_size(0).unwrap();
    assert_eq!(engine.worker_size(), 0);

    // No workers: work waits in the queue.
    engine.add(|_: &CancellationToken| Ok(()), no_cancel(), JobPriority::Default);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(engine.pending_count(), 1);
    engine.change_worker_size(1).unwrap();
    assert!(wait_until(|| engine.pending_count() == 0 && !engine.is_busy()));
}

#[test]
fn test_resize_to_zero_waits_for_running_job() {
    let engine = JobEngine::with_max_workers(1, 4).unwrap();
    let (started_tx, started_rx) = unbounded();
    let finished = Arc::new(AtomicBool::new(false));
    let finished_flag = Arc::clone(&finished);
    engine.add(
        move |_: &CancellationToken| -> Result<()> {
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(50));
            finished_flag.store(true, Ordering::SeqCst);
            Ok(())
        },
        no_cancel(),
        JobPriority::Default,
    );
    started_rx.recv_timeout(TIMEOUT).unwrap();
    engine.change_worker_size(0).unwrap();
    assert!(finished.load(Ordering::SeqCst));
}

#[test]
fn test_jobs_run_in_parallel_across_workers() {
    let engine = JobEngine::with_max_workers(2, 4).unwrap();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = unbounded();
    for _ in 0..2 {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        let tx = tx.clone();
        engine.add(
            move |_: &CancellationToken| -> Result<()> {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                wait_until(|| running.load(Ordering::SeqCst) == 2);
                running.fetch_sub(1, Ordering::SeqCst);
                tx.send(()).unwrap();
                Ok(())
            },
            no_cancel(),
            JobPriority::Default,
        );
    }
    drain(&rx, 2);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

// --- diagnostics ---

#[test]
fn test_events_and_busy_count() {
    let engine = JobEngine::with_max_workers(0, 4).unwrap();
    let events = engine.subscribe();
    assert!(!engine.is_busy());
    let request = engine.add(|_: &CancellationToken| Ok(()), no_cancel(), JobPriority::Hi);
    assert_eq!(engine.busy_count(), 1);
    assert_eq!(
        events.recv_timeout(TIMEOUT).unwrap(),
        JobEvent::Added {
            serial: request.serial(),
            priority: JobPriority::Hi
        }
    );

    engine.change_worker_size(1).unwrap();
    assert_eq!(
        events.recv_timeout(TIMEOUT).unwrap(),
        JobEvent::Removed {
            serial: request.serial(),
            priority: JobPriority::Hi,
            outcome: JobOutcome::Completed
        }
    );
    assert!(wait_until(|| engine.busy_count() == 0));
}

#[test]
fn test_request_outlives_engine() {
    let engine = JobEngine::with_max_workers(0, 4).unwrap();
    let request = engine.add(|_: &CancellationToken| Ok(()), no_cancel(), JobPriority::Low);
    drop(engine);
    assert!(!request.change_priority(JobPriority::Top));
    request.cancel();
    assert!(request.is_cancellation_requested());
}

#[test]
fn test_drop_cancels_queued_jobs() {
    let engine = JobEngine::with_max_workers(0, 4).unwrap();
    let events = engine.subscribe();
    let ran = Arc::new(AtomicBool::new(false));
    let cancelled = Arc::new(AtomicUsize::new(0));

    let requests: Vec<_> = [JobPriority::Low, JobPriority::Hi]
        .into_iter()
        .map(|priority| {
            let ran = Arc::clone(&ran);
            let cancelled = Arc::clone(&cancelled);
            engine.add(
                move |_: &CancellationToken| {
                    ran.store(true, Ordering::SeqCst);
                    Ok(())
                },
                Some(move || {
                    cancelled.fetch_add(1, Ordering::SeqCst);
                }),
                priority,
            )
        })
        .collect();
    assert_eq!(engine.pending_count(), 2);

    drop(engine);

    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(cancelled.load(Ordering::SeqCst), 2);
    assert!(requests.iter().all(|r| r.is_cancellation_requested()));
    let mut outcomes = removed_outcomes(&events, 2);
    outcomes.sort_by_key(|(serial, _)| *serial);
    assert_eq!(
        outcomes,
        vec![
            (requests[0].serial(), JobOutcome::Cancelled),
            (requests[1].serial(), JobOutcome::Cancelled),
        ]
    );
}
