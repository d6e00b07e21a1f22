//! The option bag driving scan mode and budgets.
//!
//! Exactly one production path runs per scan; the first set mode option
//! wins in the order `commit`, `files_at_commit`, `commits`,
//! `commits_file`, then the default history walk. The remaining fields
//! are budgets and toggles shared by all modes.

use std::path::PathBuf;
use std::time::Duration;

/// Scan options. `Default` means: full history walk of HEAD, unlimited
/// depth, one worker per logical CPU, additions only.
#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Path to the repository to scan.
    pub repo_path: PathBuf,
    /// Scan a single commit's patches (`latest` or a hex hash).
    pub commit: Option<String>,
    /// Scan all files at one commit.
    pub files_at_commit: Option<String>,
    /// Comma-separated commits to scan as patches.
    pub commits: Option<String>,
    /// Path to a newline-delimited list of commits.
    pub commits_file: Option<PathBuf>,
    /// Terminal hash during the history walk; the walk stops after
    /// dispatching it.
    pub commit_to: Option<String>,
    /// Branch to walk instead of HEAD.
    pub branch: Option<String>,
    /// Maximum commits to enter during the walk. 0 = unlimited.
    pub depth: usize,
    /// Worker pool size. 0 = number of logical CPUs.
    pub threads: usize,
    /// Also scan deletion hunks.
    pub deletion: bool,
    /// Prefer a repo-local config file over the manager's config.
    pub repo_config: bool,
    /// Global wall-clock deadline. `None` (or zero) = no deadline.
    pub timeout: Option<Duration>,
    /// Scan staged/uncommitted changes instead of history.
    pub uncommitted: bool,
    /// Explicit config file path (CLI only).
    pub config_path: Option<PathBuf>,
    /// Report output path (CLI only).
    pub report: Option<PathBuf>,
}

/// Parses a human duration: a bare number is seconds, with optional
/// `ms`/`s`/`m`/`h` suffix.
#[must_use]
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    let (value, scale) = if let Some(v) = text.strip_suffix("ms") {
        (v, Duration::from_millis(1))
    } else if let Some(v) = text.strip_suffix('s') {
        (v, Duration::from_secs(1))
    } else if let Some(v) = text.strip_suffix('m') {
        (v, Duration::from_secs(60))
    } else if let Some(v) = text.strip_suffix('h') {
        (v, Duration::from_secs(3600))
    } else {
        (text, Duration::from_secs(1))
    };
    let value: u64 = value.trim().parse().ok()?;
    Some(scale * u32::try_from(value).ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse_with_and_without_suffix() {
        assert_eq!(parse_duration("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("10m"), Some(Duration::from_secs(600)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("nope"), None);
    }
}
