//! Git scan driver.
//!
//! Enumerates units of work from a repository under one of several
//! mutually exclusive modes, turns each unit into textual content, and
//! dispatches that content to the rule matcher under a bounded worker
//! pool.
//!
//! Pipeline overview:
//! 1. `driver` selects the production path from the options.
//! 2. `walk` traverses history, first parent only, roots inline.
//! 3. `commit` resolves references and produces per-commit units
//!    (patch hunks or file snapshots).
//! 4. `staged` produces units for uncommitted or empty-repo state.
//! 5. `patch` builds owned parent→child patches on the producer thread.
//! 6. `dispatch` runs per-commit scans on a bounded pool.
//! 7. `budget` short-circuits all of the above on timeout, depth, or the
//!    terminal commit.
//!
//! # Invariants
//! - Exactly one production path runs per scan.
//! - Every bundle carries a commit identity (staged scans use the
//!   sentinel) and non-binary content.
//! - Once the deadline passes, no new bundles are dispatched; in-flight
//!   workers finish their current bundle.

pub mod budget;
pub mod bundle;
pub mod dispatch;
pub mod errors;
pub mod patch;
pub mod repo;
pub mod staged_diff;

mod commit;
mod driver;
mod staged;
mod walk;

pub use budget::{BudgetGate, TimeoutGate};
pub use bundle::{
    Bundle, CommitInfo, Operation, ScanType, STAGED_MESSAGE, UNKNOWN_PATH, ZERO_HASH,
};
pub use dispatch::{worker_count, Dispatcher};
pub use errors::ScanError;
pub use patch::{generate_commit_patch, CommitPatch, FilePatch, Segment};
pub use repo::Repo;
pub use staged_diff::{inserted_lines, inserted_text};
