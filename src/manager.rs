//! Shared scan state: options, configuration, the leak sink, and
//! counters.
//!
//! One manager is shared by the producer thread and every worker, so all
//! mutating operations are internally serialized: the leak sink sits
//! behind a mutex, counters and timings use relaxed atomics. Snapshots
//! are best-effort and intended for coarse diagnostics rather than exact
//! accounting.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::Config;
use crate::options::Options;
use crate::report::Leak;

/// Which phase a recorded duration belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeKind {
    /// Time spent generating one parent→child patch.
    Patch,
    /// Total wall-clock time of one scan entry point.
    Scan,
}

/// Snapshot of accumulated timings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timings {
    /// Accumulated patch-generation time.
    pub patch: Duration,
    /// Accumulated scan time.
    pub scan: Duration,
}

/// Options, configuration, and scan-wide sinks.
#[derive(Debug)]
pub struct Manager {
    opts: Options,
    config: Config,
    leaks: Mutex<Vec<Leak>>,
    commits: AtomicUsize,
    patch_nanos: AtomicU64,
    scan_nanos: AtomicU64,
}

impl Manager {
    /// Creates a manager with the given options and base configuration.
    #[must_use]
    pub fn new(opts: Options, config: Config) -> Self {
        Self {
            opts,
            config,
            leaks: Mutex::new(Vec::new()),
            commits: AtomicUsize::new(0),
            patch_nanos: AtomicU64::new(0),
            scan_nanos: AtomicU64::new(0),
        }
    }

    /// The option bag this manager was created with.
    #[must_use]
    pub fn opts(&self) -> &Options {
        &self.opts
    }

    /// The manager's base configuration (repos may override per scan).
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accumulates a duration under the given kind.
    pub fn record_time(&self, kind: TimeKind, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let counter = match kind {
            TimeKind::Patch => &self.patch_nanos,
            TimeKind::Scan => &self.scan_nanos,
        };
        counter.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Snapshot of accumulated timings.
    #[must_use]
    pub fn timings(&self) -> Timings {
        Timings {
            patch: Duration::from_nanos(self.patch_nanos.load(Ordering::Relaxed)),
            scan: Duration::from_nanos(self.scan_nanos.load(Ordering::Relaxed)),
        }
    }

    /// Adds `n` to the commits-entered counter.
    pub fn increment_commits(&self, n: usize) {
        self.commits.fetch_add(n, Ordering::Relaxed);
    }

    /// Number of commits entered across all scans on this manager.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::Relaxed)
    }

    /// Appends a leak to the sink. Thread-safe.
    pub fn send_leak(&self, leak: Leak) {
        self.sink().push(leak);
    }

    /// A copy of all leaks recorded so far.
    #[must_use]
    pub fn leaks(&self) -> Vec<Leak> {
        self.sink().clone()
    }

    /// Number of leaks recorded so far.
    #[must_use]
    pub fn leak_count(&self) -> usize {
        self.sink().len()
    }

    fn sink(&self) -> std::sync::MutexGuard<'_, Vec<Leak>> {
        // Workers contain their panics, but a poisoned sink would still
        // hold valid leaks.
        self.leaks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
