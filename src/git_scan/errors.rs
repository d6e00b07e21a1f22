//! Error types for the scan driver.
//!
//! One enum covers the driver's fatal failure modes; budget exhaustion
//! and allowlist hits are not errors and never appear here. The enum is
//! `#[non_exhaustive]` so variants can be added without breaking callers;
//! consumers should include a fallback match arm.
//!
//! Git and I/O errors preserve their sources to keep diagnostics
//! actionable.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Fatal errors surfaced by `scan()` and `scan_uncommitted()`.
#[derive(Debug)]
#[non_exhaustive]
pub enum ScanError {
    /// The repository handle is empty or could not be opened.
    EmptyRepo { name: String },
    /// A user-supplied commit reference did not resolve.
    CommitNotFound { reference: String, source: git2::Error },
    /// The repository has no resolvable HEAD outside the empty-repo path.
    HeadUnresolved(git2::Error),
    /// An object-store or worktree operation failed.
    Git(git2::Error),
    /// I/O failure reading a commits file or worktree contents.
    Io { path: PathBuf, source: io::Error },
    /// Repo-local configuration failed to load.
    RepoConfig(crate::config::ConfigError),
    /// The worker pool could not be started.
    WorkerSpawn(io::Error),
}

impl ScanError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRepo { name } => write!(f, "{name} repo is empty"),
            Self::CommitNotFound { reference, source } => {
                write!(f, "commit {reference} not found: {source}")
            }
            Self::HeadUnresolved(err) => write!(f, "could not resolve HEAD: {err}"),
            Self::Git(err) => write!(f, "git error: {err}"),
            Self::Io { path, source } => write!(f, "I/O error on {}: {source}", path.display()),
            Self::RepoConfig(err) => write!(f, "repo config load failed: {err}"),
            Self::WorkerSpawn(err) => write!(f, "could not start worker pool: {err}"),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CommitNotFound { source, .. } => Some(source),
            Self::HeadUnresolved(err) | Self::Git(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::RepoConfig(err) => Some(err),
            Self::WorkerSpawn(err) => Some(err),
            Self::EmptyRepo { .. } => None,
        }
    }
}

impl From<git2::Error> for ScanError {
    fn from(err: git2::Error) -> Self {
        Self::Git(err)
    }
}

impl From<crate::config::ConfigError> for ScanError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::RepoConfig(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_the_failing_reference() {
        let err = ScanError::CommitNotFound {
            reference: "deadbeef".into(),
            source: git2::Error::from_str("odb: object not found"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("deadbeef"));
    }

    #[test]
    fn io_variant_preserves_path_and_source() {
        let err = ScanError::io(
            "/tmp/commits.txt",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        let msg = format!("{err}");
        assert!(msg.contains("commits.txt"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
