//! Secret scanner for git repositories.
//!
//! Inspects a repository's history, individual commits, or staged
//! changes for text matching configured secret-detection rules, and
//! reports each occurrence with enough provenance to locate it: commit
//! hash, file path, line number, author, and git operation.
//!
//! High-level flow:
//! 1. A [`manager::Manager`] holds the options, configuration, leak
//!    sink, and counters for a run.
//! 2. A [`git_scan::Repo`] binds a repository to the manager and drives
//!    one of the scan modes (history walk, single commit, commit list,
//!    files at a commit, staged changes).
//! 3. Producers normalize everything into [`git_scan::Bundle`]s; the
//!    [`matcher::RuleSet`] evaluates rules over each bundle and appends
//!    [`report::Leak`]s to the sink.
//! 4. [`report`] serializes the sink as JSON or SARIF.

pub mod config;
pub mod git_scan;
pub mod manager;
pub mod matcher;
pub mod options;
pub mod report;

pub use config::Config;
pub use git_scan::{Bundle, Repo, ScanError};
pub use manager::Manager;
pub use options::Options;
pub use report::Leak;
