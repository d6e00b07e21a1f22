//! Bounded worker pool for per-commit scanning.
//!
//! The history walker generates patches on its own thread and hands each
//! commit's scan to this pool. Capacity equals the worker count, so at
//! most that many matcher passes are ever in flight; `submit` blocks once
//! the queue is full, which is the walk's backpressure. No ordering is
//! guaranteed across commits.
//!
//! A task that panics is contained: the worker swallows the unwind,
//! releases its slot by looping, and the pool stays whole.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};

/// A per-commit scan closure. Owns everything it needs; workers never
/// touch the object store.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Resolves the configured thread count: 0 means one worker per logical
/// CPU.
#[must_use]
pub fn worker_count(threads: usize) -> usize {
    if threads == 0 {
        num_cpus::get().max(1)
    } else {
        threads
    }
}

/// Fixed-size pool of scan workers fed by a bounded queue.
#[derive(Debug)]
pub struct Dispatcher {
    queue: Sender<Task>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawns the pool. `threads` of 0 selects the CPU-count default.
    pub fn new(threads: usize) -> io::Result<Self> {
        let count = worker_count(threads);
        let (queue, tasks) = bounded::<Task>(count);

        let mut workers = Vec::with_capacity(count);
        for id in 0..count {
            let tasks = tasks.clone();
            let handle = thread::Builder::new()
                .name(format!("scan-worker-{id}"))
                .spawn(move || {
                    while let Ok(task) = tasks.recv() {
                        let _ = panic::catch_unwind(AssertUnwindSafe(task));
                    }
                })?;
            workers.push(handle);
        }

        Ok(Self { queue, workers })
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Enqueues one per-commit scan, blocking while the queue is full.
    pub fn submit(&self, task: Task) {
        // Send only fails if every worker is gone, and workers only exit
        // when the queue closes in drain().
        let _ = self.queue.send(task);
    }

    /// Closes the queue and blocks until all in-flight tasks complete.
    pub fn drain(self) {
        drop(self.queue);
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn never_exceeds_the_configured_concurrency() {
        let pool = Dispatcher::new(2).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..12 {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            let done = Arc::clone(&done);
            pool.submit(Box::new(move || {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.drain();

        assert_eq!(done.load(Ordering::SeqCst), 12);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn drain_waits_for_every_task() {
        let pool = Dispatcher::new(4).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..32 {
            let done = Arc::clone(&done);
            pool.submit(Box::new(move || {
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.drain();
        assert_eq!(done.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn panicking_task_releases_its_slot() {
        let pool = Dispatcher::new(1).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        pool.submit(Box::new(|| panic!("contained")));
        let counter = Arc::clone(&done);
        pool.submit(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        pool.drain();

        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_threads_selects_the_cpu_default() {
        assert!(worker_count(0) >= 1);
        assert_eq!(worker_count(3), 3);
    }
}
