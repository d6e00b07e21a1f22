//! Parent→child patch generation and its owned representation.
//!
//! Patches are generated on the producer thread (workers never touch the
//! object store) and handed off as plain owned data: per-file patches
//! whose added/deleted lines are grouped into contiguous segments, plus
//! the full unified-diff text for provenance. Each segment remembers the
//! line its content starts at so patch-scan leaks get exact line numbers.
//!
//! Generation runs inside a fault boundary: a panic while diffing one
//! commit skips that commit instead of killing the walk.
//!
//! # Invariants
//! - Segments never mix operations; consecutive lines of one origin form
//!   one segment, in patch-declared order.
//! - Binary deltas produce no segments and are flagged so producers can
//!   skip them.

use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use super::bundle::Operation;

/// One contiguous run of added or deleted lines inside a hunk.
#[derive(Clone, Debug)]
pub struct Segment {
    /// [`Operation::Add`] or [`Operation::Delete`]; context is dropped.
    pub op: Operation,
    /// Post-image line number for additions, pre-image for deletions.
    pub start_line: u32,
    /// The segment's lines, newline-terminated as in the patch.
    pub text: String,
}

/// Diff of a single file between parent and child trees.
#[derive(Clone, Debug, Default)]
pub struct FilePatch {
    /// Path on the parent side, when the file existed there.
    pub from_path: Option<String>,
    /// Path on the child side, when the file exists there.
    pub to_path: Option<String>,
    /// Binary deltas carry no segments and are never bundled.
    pub binary: bool,
    /// Added/deleted runs in patch-declared order.
    pub segments: Vec<Segment>,
}

impl FilePatch {
    /// Path selection for bundles: prefer the parent side, else the
    /// child side.
    #[must_use]
    pub fn display_path(&self) -> Option<&str> {
        self.from_path.as_deref().or(self.to_path.as_deref())
    }
}

/// Owned patch of one commit against one parent.
#[derive(Clone, Debug, Default)]
pub struct CommitPatch {
    /// Full unified-diff text, carried on every bundle from this patch.
    pub text: String,
    /// Per-file patches in diff order.
    pub files: Vec<FilePatch>,
}

/// Diffs `parent`'s tree against `commit`'s tree.
///
/// Returns `Ok(None)` when generation panicked; the caller skips the
/// commit and the walk continues. Other failures are real object-store
/// errors and surface as `Err`.
pub fn generate_commit_patch(
    repo: &git2::Repository,
    parent: &git2::Commit<'_>,
    commit: &git2::Commit<'_>,
) -> Result<Option<CommitPatch>, git2::Error> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| build_patch(repo, parent, commit)));
    match result {
        Ok(build) => build.map(Some),
        Err(_) => {
            error!(commit = %commit.id(), "could not generate patch");
            Ok(None)
        }
    }
}

fn build_patch(
    repo: &git2::Repository,
    parent: &git2::Commit<'_>,
    commit: &git2::Commit<'_>,
) -> Result<CommitPatch, git2::Error> {
    let parent_tree = parent.tree()?;
    let commit_tree = commit.tree()?;
    let diff = repo.diff_tree_to_tree(Some(&parent_tree), Some(&commit_tree), None)?;

    let mut text = String::new();
    diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
        match line.origin() {
            '+' | '-' | ' ' => text.push(line.origin()),
            _ => {}
        }
        text.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;

    let delta_count = diff.deltas().count();
    let mut files = Vec::with_capacity(delta_count);
    for idx in 0..delta_count {
        files.push(build_file_patch(&diff, idx)?);
    }

    Ok(CommitPatch { text, files })
}

fn build_file_patch(diff: &git2::Diff<'_>, idx: usize) -> Result<FilePatch, git2::Error> {
    let delta = diff
        .get_delta(idx)
        .ok_or_else(|| git2::Error::from_str("delta index out of range"))?;

    let mut file = FilePatch {
        from_path: side_path(&delta.old_file()),
        to_path: side_path(&delta.new_file()),
        binary: delta.flags().is_binary(),
        segments: Vec::new(),
    };

    let patch = match git2::Patch::from_diff(diff, idx)? {
        Some(patch) => patch,
        // No textual patch for this delta (binary or unreadable).
        None => {
            file.binary = true;
            return Ok(file);
        }
    };
    // The binary flag is only authoritative after content has loaded.
    file.binary = file.binary || patch.delta().flags().is_binary();
    if file.binary {
        return Ok(file);
    }

    let mut current: Option<Segment> = None;
    for hunk_idx in 0..patch.num_hunks() {
        for line_idx in 0..patch.num_lines_in_hunk(hunk_idx)? {
            let line = patch.line_in_hunk(hunk_idx, line_idx)?;
            let op = match line.origin() {
                '+' => Operation::Add,
                '-' => Operation::Delete,
                // Context and EOF markers end the current run.
                _ => {
                    if let Some(done) = current.take() {
                        file.segments.push(done);
                    }
                    continue;
                }
            };

            let content = String::from_utf8_lossy(line.content());
            match current.as_mut() {
                Some(seg) if seg.op == op => seg.text.push_str(&content),
                _ => {
                    if let Some(done) = current.take() {
                        file.segments.push(done);
                    }
                    let start_line = match op {
                        Operation::Add => line.new_lineno(),
                        _ => line.old_lineno(),
                    }
                    .unwrap_or(1);
                    current = Some(Segment {
                        op,
                        start_line,
                        text: content.into_owned(),
                    });
                }
            }
        }
        // Hunks never share a run.
        if let Some(done) = current.take() {
            file.segments.push(done);
        }
    }

    Ok(file)
}

fn side_path(side: &git2::DiffFile<'_>) -> Option<String> {
    if side.id().is_zero() {
        return None;
    }
    side.path().map(|p| p.to_string_lossy().into_owned())
}
