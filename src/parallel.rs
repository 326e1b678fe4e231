//! Bounded worker pool for file tasks.
//!
//! [`ParallelExecutor`] wraps a rayon [`ThreadPool`]. Each submitted task
//! reports back over its own channel, so a caller can wait on one task with a
//! time budget. Panics are caught at the task boundary and surface as
//! [`Error::Internal`]; they never take a worker down.

use crate::config::ParallelOptions;
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

static GLOBAL: OnceLock<Arc<ParallelExecutor>> = OnceLock::new();

/// Progress of a submitted task.
enum TaskEvent<T> {
    Started(Instant),
    Finished {
        outcome: std::thread::Result<T>,
        elapsed: Duration,
    },
}

/// Handle to a task running on a [`ParallelExecutor`].
pub struct TaskHandle<T> {
    events: Receiver<TaskEvent<T>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes.
    ///
    /// The time budget starts when a worker picks the task up, not when it
    /// was queued or when this call began. A task that ran past its budget
    /// is a timeout even if it finished before this call. On timeout the
    /// worker keeps running in the background and its result is discarded.
    pub fn wait(self, timeout: Option<Duration>) -> Result<T> {
        let mut event = self.events.recv().map_err(|_| lost_task())?;
        if let TaskEvent::Started(started) = event {
            event = match timeout {
                None => self.events.recv().map_err(|_| lost_task())?,
                Some(budget) => {
                    let remaining = budget.saturating_sub(started.elapsed());
                    match self.events.recv_timeout(remaining) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => return Err(timed_out(budget)),
                        Err(RecvTimeoutError::Disconnected) => return Err(lost_task()),
                    }
                }
            };
        }

        let TaskEvent::Finished { outcome, elapsed } = event else {
            return Err(lost_task());
        };
        if let Some(budget) = timeout.filter(|budget| elapsed > *budget) {
            return Err(timed_out(budget));
        }
        outcome.map_err(|payload| {
            Error::Internal(format!("task panicked: {}", panic_message(payload.as_ref())))
        })
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle").finish_non_exhaustive()
    }
}

fn timed_out(budget: Duration) -> Error {
    Error::Timeout(budget.as_millis() as u64)
}

fn lost_task() -> Error {
    Error::Internal("task ended without reporting a result".to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Worker pool executing independent tasks.
pub struct ParallelExecutor {
    pool: ThreadPool,
}

impl ParallelExecutor {
    /// Create a pool with `worker_count` threads (0 = available parallelism).
    pub fn new(worker_count: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("docmark-worker-{}", i))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build worker pool: {}", e)))?;
        log::debug!("Started worker pool with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    /// Create a pool sized by configuration.
    pub fn from_options(options: &ParallelOptions) -> Result<Self> {
        Self::new(options.worker_count)
    }

    /// The process-wide pool, created on first use.
    pub fn global() -> Result<Arc<Self>> {
        if let Some(executor) = GLOBAL.get() {
            return Ok(executor.clone());
        }
        let executor = Arc::new(Self::new(0)?);
        Ok(GLOBAL.get_or_init(|| executor).clone())
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue a task on the pool.
    pub fn submit<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(2);
        self.pool.spawn(move || {
            // The receiver may be gone after a timeout
            let started = Instant::now();
            let _ = tx.send(TaskEvent::Started(started));
            let outcome = panic::catch_unwind(AssertUnwindSafe(task));
            let _ = tx.send(TaskEvent::Finished {
                outcome,
                elapsed: started.elapsed(),
            });
        });
        TaskHandle { events: rx }
    }

    /// Submit every task, then wait for all of them in submission order.
    pub fn run_all<F, T>(&self, tasks: Vec<F>, timeout: Option<Duration>) -> Vec<Result<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<TaskHandle<T>> = tasks.into_iter().map(|task| self.submit(task)).collect();
        handles.into_iter().map(|handle| handle.wait(timeout)).collect()
    }
}

impl std::fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("workers", &self.worker_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_submit_and_wait() {
        let executor = ParallelExecutor::new(2).unwrap();
        assert_eq!(executor.worker_count(), 2);
        let handle = executor.submit(|| 21 * 2);
        assert_eq!(handle.wait(None).unwrap(), 42);
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let executor = ParallelExecutor::new(1).unwrap();
        let handle = executor.submit(|| -> u32 { panic!("boom") });
        let err = handle.wait(None).unwrap_err();
        assert!(matches!(err, Error::Internal(ref msg) if msg.contains("boom")));

        // the worker survives
        assert_eq!(executor.submit(|| 1).wait(None).unwrap(), 1);
    }

    #[test]
    fn test_timeout() {
        let executor = ParallelExecutor::new(1).unwrap();
        let handle = executor.submit(|| std::thread::sleep(Duration::from_millis(500)));
        let err = handle.wait(Some(Duration::from_millis(20))).unwrap_err();
        assert!(matches!(err, Error::Timeout(20)));
    }

    #[test]
    fn test_budget_starts_when_task_runs() {
        let executor = ParallelExecutor::new(1).unwrap();
        let slow = executor.submit(|| std::thread::sleep(Duration::from_millis(200)));
        let quick = executor.submit(|| std::thread::sleep(Duration::from_millis(5)));
        // queued behind the slow task, but fits its own budget
        assert!(quick.wait(Some(Duration::from_millis(150))).is_ok());
        assert!(slow.wait(None).is_ok());
    }

    #[test]
    fn test_overrun_counts_even_when_collected_late() {
        let executor = ParallelExecutor::new(2).unwrap();
        let tasks: Vec<fn() -> u64> = vec![
            || {
                std::thread::sleep(Duration::from_millis(150));
                150
            },
            || {
                std::thread::sleep(Duration::from_millis(400));
                400
            },
        ];
        // the second task is only waited on after the first returns
        let results = executor.run_all(tasks, Some(Duration::from_millis(300)));
        assert_eq!(results[0].as_ref().unwrap(), &150);
        assert!(matches!(results[1], Err(Error::Timeout(300))));
    }

    #[test]
    fn test_zero_budget() {
        let executor = ParallelExecutor::new(1).unwrap();
        let handle = executor.submit(|| std::thread::sleep(Duration::from_millis(5)));
        let err = handle.wait(Some(Duration::ZERO)).unwrap_err();
        assert!(matches!(err, Error::Timeout(0)));
    }

    #[test]
    fn test_run_all_preserves_order() {
        let executor = ParallelExecutor::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let counter = counter.clone();
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    i * 10
                }
            })
            .collect();
        let results = executor.run_all(tasks, None);
        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..16).map(|i| i * 10).collect::<Vec<_>>());
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn test_global_is_shared() {
        let a = ParallelExecutor::global().unwrap();
        let b = ParallelExecutor::global().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.worker_count() >= 1);
    }
}
