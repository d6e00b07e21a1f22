//! The unit of work handed to the rule matcher.
//!
//! Producers normalize everything they find (patch hunks, file snapshots
//! at a commit, staged insertions) into [`Bundle`]s so the matcher sees a
//! single input shape regardless of scan mode. A bundle always carries a
//! commit identity; staged and empty-repo scans use a fixed sentinel
//! commit instead of modeling "no commit" downstream.
//!
//! # Invariants
//! - `commit` is always populated (the sentinel satisfies this).
//! - `content` is never binary; producers sniff and skip binary inputs.
//! - `file_path` is a real path or `"???"` when neither diff side has one.

use chrono::{DateTime, TimeZone, Utc};

/// Hash value carried by the staged-scan sentinel commit.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000";

/// Commit message carried by the staged-scan sentinel commit.
pub const STAGED_MESSAGE: &str = "***STAGED CHANGES***";

/// Placeholder path when neither side of a rename/delete exposes a name.
pub const UNKNOWN_PATH: &str = "???";

/// How a bundle's content relates to the diff that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Content was added by the originating change.
    Add,
    /// Content was removed by the originating change.
    Delete,
    /// Content is unchanged context.
    Equal,
}

impl Operation {
    /// Human-readable name used in leak records and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "addition",
            Self::Delete => "deletion",
            Self::Equal => "equal",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag telling the matcher how to map content offsets to source lines.
///
/// The three scan modes produce content with different line semantics:
/// a patch segment starts at its hunk's post-image line, a commit
/// snapshot starts at line 1, and staged content is a concatenation of
/// insertions whose line numbers are approximate by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanType {
    /// Content is a single hunk segment from a parent→child patch.
    Patch,
    /// Content is a full file snapshot at a commit.
    Commit,
    /// Content is concatenated insertions from a staged or worktree diff.
    Uncommitted,
}

/// Commit identity attached to every bundle.
///
/// This is an owned copy of the fields the matcher and reports need, so
/// bundles can cross thread boundaries without referencing the object
/// store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full hex hash.
    pub hash: String,
    /// Author name; empty for the sentinel.
    pub author: String,
    /// Author email; empty for the sentinel.
    pub email: String,
    /// Full commit message.
    pub message: String,
    /// Author timestamp.
    pub when: DateTime<Utc>,
}

impl CommitInfo {
    /// Builds an owned identity record from a git commit.
    #[must_use]
    pub fn from_commit(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        Self {
            hash: commit.id().to_string(),
            author: author.name().unwrap_or_default().to_owned(),
            email: author.email().unwrap_or_default().to_owned(),
            message: commit.message().unwrap_or_default().to_owned(),
            when: Utc
                .timestamp_opt(author.when().seconds(), 0)
                .single()
                .unwrap_or_default(),
        }
    }

    /// The fixed sentinel used for staged and empty-repo scans.
    ///
    /// Staged changes have no commit yet; the matcher still receives a
    /// commit-shaped record: zero hash, staged message, empty author,
    /// epoch UTC timestamp.
    #[must_use]
    pub fn staged_sentinel() -> Self {
        Self {
            hash: ZERO_HASH.to_owned(),
            author: String::new(),
            email: String::new(),
            message: STAGED_MESSAGE.to_owned(),
            when: Utc.timestamp_opt(0, 0).single().unwrap_or_default(),
        }
    }

    /// Returns true if this record is the staged sentinel.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.hash == ZERO_HASH
    }
}

/// A normalized unit of content plus provenance.
///
/// Created by exactly one producer, consumed once by the matcher, then
/// discarded. Never shared between workers.
#[derive(Clone, Debug)]
pub struct Bundle {
    /// Identity of the originating commit (sentinel for staged scans).
    pub commit: CommitInfo,
    /// Full textual patch of the originating commit; empty outside
    /// patch scans.
    pub patch: String,
    /// The text the matcher inspects.
    pub content: String,
    /// Source file path, or [`UNKNOWN_PATH`].
    pub file_path: String,
    /// Diff operation that produced the content.
    pub operation: Operation,
    /// Line-lookup tag, preserved verbatim into the matcher.
    pub scan_type: ScanType,
    /// Source line of the first content line. Exact for patch and commit
    /// scans; 1 (approximate) for uncommitted scans.
    pub start_line: u32,
}

impl Bundle {
    /// A snapshot bundle: full file contents at a commit.
    #[must_use]
    pub fn snapshot(commit: CommitInfo, file_path: String, content: String) -> Self {
        Self {
            commit,
            patch: String::new(),
            content,
            file_path,
            operation: Operation::Add,
            scan_type: ScanType::Commit,
            start_line: 1,
        }
    }

    /// An uncommitted bundle: staged or worktree content under the
    /// sentinel commit.
    #[must_use]
    pub fn uncommitted(file_path: String, content: String) -> Self {
        Self {
            commit: CommitInfo::staged_sentinel(),
            patch: String::new(),
            content,
            file_path,
            operation: Operation::Add,
            scan_type: ScanType::Uncommitted,
            start_line: 1,
        }
    }
}
