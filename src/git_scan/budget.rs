//! Termination predicates polled between units of work.
//!
//! Three budgets can end a scan early: a wall-clock deadline, a maximum
//! number of commits entered, and a terminal commit hash. None of them is
//! an error; producers that observe a fired budget stop cleanly between
//! units and never mid-bundle. In-flight workers are not interrupted.
//!
//! A cooperative cancel flag rides along with the deadline so an external
//! caller can stop a scan the same way the timeout does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

/// Cheaply cloneable handle workers poll between hunks.
///
/// Carries only the pieces of the budget that matter off the producer
/// thread: the deadline and the shared cancel flag.
#[derive(Clone, Debug)]
pub struct TimeoutGate {
    deadline: Option<Instant>,
    cancel: Arc<AtomicBool>,
}

impl TimeoutGate {
    /// True once the deadline has passed or the scan was cancelled.
    ///
    /// With no deadline configured this only reflects the cancel flag.
    #[must_use]
    pub fn reached(&self) -> bool {
        if self.cancel.load(Ordering::Relaxed) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

/// Timeout, depth, and commit-range termination state for one scan.
#[derive(Debug)]
pub struct BudgetGate {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    depth: usize,
    depth_warned: bool,
    commit_to: Option<String>,
    cancel: Arc<AtomicBool>,
}

impl BudgetGate {
    /// Builds an unarmed gate. `timeout` of `None` (or zero) means no
    /// deadline; `depth` of 0 means unlimited.
    #[must_use]
    pub fn new(timeout: Option<Duration>, depth: usize, commit_to: Option<String>) -> Self {
        let timeout = timeout.filter(|t| !t.is_zero());
        Self {
            timeout,
            deadline: None,
            depth,
            depth_warned: false,
            commit_to,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Installs the deadline. Called once at scan start; re-arming moves
    /// the deadline forward from now.
    pub fn arm(&mut self) {
        self.deadline = self.timeout.map(|t| Instant::now() + t);
    }

    /// Shared flag external callers may set to stop the scan between
    /// units.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// True once wall-clock time has passed the armed deadline (or the
    /// cancel flag was raised).
    #[must_use]
    pub fn timeout_reached(&self) -> bool {
        self.timeout_gate().reached()
    }

    /// The view handed to workers.
    #[must_use]
    pub fn timeout_gate(&self) -> TimeoutGate {
        TimeoutGate {
            deadline: self.deadline,
            cancel: Arc::clone(&self.cancel),
        }
    }

    /// True when a non-zero depth equals the number of commits entered so
    /// far. Warns exactly once when it fires.
    pub fn depth_reached(&mut self, entered: usize) -> bool {
        if self.depth != 0 && self.depth == entered {
            if !self.depth_warned {
                self.depth_warned = true;
                warn!(depth = self.depth, "exceeded depth limit");
            }
            return true;
        }
        false
    }

    /// True when `hash` is the configured terminal commit.
    #[must_use]
    pub fn commit_to_reached(&self, hash: &str) -> bool {
        self.commit_to.as_deref() == Some(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unarmed_gate_never_times_out() {
        let gate = BudgetGate::new(Some(Duration::from_nanos(1)), 0, None);
        assert!(!gate.timeout_reached());
    }

    #[test]
    fn zero_timeout_means_no_deadline() {
        let mut gate = BudgetGate::new(Some(Duration::ZERO), 0, None);
        gate.arm();
        assert!(!gate.timeout_reached());
    }

    #[test]
    fn armed_tiny_deadline_fires() {
        let mut gate = BudgetGate::new(Some(Duration::from_nanos(1)), 0, None);
        gate.arm();
        std::thread::sleep(Duration::from_millis(2));
        assert!(gate.timeout_reached());
    }

    #[test]
    fn depth_zero_is_unlimited() {
        let mut gate = BudgetGate::new(None, 0, None);
        assert!(!gate.depth_reached(0));
        assert!(!gate.depth_reached(10_000));
    }

    #[test]
    fn depth_fires_at_exact_count() {
        let mut gate = BudgetGate::new(None, 3, None);
        assert!(!gate.depth_reached(2));
        assert!(gate.depth_reached(3));
        assert!(gate.depth_reached(3));
        assert!(!gate.depth_reached(4));
    }

    #[test]
    fn commit_to_matches_only_the_terminal_hash() {
        let gate = BudgetGate::new(None, 0, Some("abc123".into()));
        assert!(gate.commit_to_reached("abc123"));
        assert!(!gate.commit_to_reached("def456"));

        let unset = BudgetGate::new(None, 0, None);
        assert!(!unset.commit_to_reached("abc123"));
    }

    #[test]
    fn cancel_flag_trips_the_timeout_gate() {
        let gate = BudgetGate::new(None, 0, None);
        let flag = gate.cancel_flag();
        let view = gate.timeout_gate();
        assert!(!view.reached());
        flag.store(true, Ordering::Relaxed);
        assert!(view.reached());
        assert!(gate.timeout_reached());
    }
}
