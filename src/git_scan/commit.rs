//! Commit resolution and commit-level producers.
//!
//! Two per-commit strategies exist: diff the commit against its parents
//! and scan the resulting hunks, or snapshot every file reachable from
//! the commit's tree. A root commit has no parents, so the patch
//! strategy delegates to the snapshot one; the two are observationally
//! equivalent there.
//!
//! Unlike the history walker, `scan_commit_patches` inspects **every**
//! parent: the caller named one commit and wants its full story, while
//! the walker reaches merge side-branches as tips of other visited
//! histories.

use std::time::Instant;

use crate::git_scan::bundle::{Bundle, CommitInfo, Operation, ScanType, UNKNOWN_PATH};
use crate::git_scan::patch::{generate_commit_patch, CommitPatch};
use crate::manager::{Manager, TimeKind};

use super::errors::ScanError;
use super::repo::ScanContext;

/// Resolves a user-supplied reference to a commit.
///
/// `latest` resolves to the current HEAD; anything else is treated as a
/// hex hash. The manager's commit counter is bumped before the lookup,
/// regardless of whether it succeeds.
pub(crate) fn resolve_commit<'r>(
    git: &'r git2::Repository,
    manager: &Manager,
    reference: &str,
) -> Result<git2::Commit<'r>, ScanError> {
    let reference = reference.trim();
    let oid = if reference == "latest" {
        git.head()
            .map_err(ScanError::HeadUnresolved)?
            .peel_to_commit()?
            .id()
    } else {
        git2::Oid::from_str(reference).map_err(|source| ScanError::CommitNotFound {
            reference: reference.to_owned(),
            source,
        })?
    };

    manager.increment_commits(1);
    git.find_commit(oid).map_err(|source| ScanError::CommitNotFound {
        reference: reference.to_owned(),
        source,
    })
}

/// Scans the patches of one commit against each of its parents.
///
/// Roots delegate to [`scan_files_at_commit`]. Patch generation failures
/// surface here (the caller asked for this specific commit); a
/// generation panic still only skips the affected parent.
pub(crate) fn scan_commit_patches(
    git: &git2::Repository,
    ctx: &ScanContext,
    commit: &git2::Commit<'_>,
) -> Result<(), ScanError> {
    if commit.parent_count() == 0 {
        return scan_files_at_commit(git, ctx, commit);
    }

    let info = CommitInfo::from_commit(commit);
    for parent_idx in 0..commit.parent_count() {
        if ctx.timeout.reached() {
            return Ok(());
        }
        let parent = commit.parent(parent_idx)?;

        let started = Instant::now();
        let patch = generate_commit_patch(git, &parent, commit)?;
        ctx.manager.record_time(TimeKind::Patch, started.elapsed());

        if let Some(patch) = patch {
            scan_patch(ctx, &info, &patch);
        }
    }
    Ok(())
}

/// Emits one bundle per eligible hunk segment of an owned patch.
///
/// Eligible means: the file is not binary or allowlisted, the segment is
/// an addition (or a deletion with deletion-scanning enabled), and the
/// deadline has not passed. Segments are visited in patch-declared
/// order.
pub(crate) fn scan_patch(ctx: &ScanContext, info: &CommitInfo, patch: &CommitPatch) {
    for file in &patch.files {
        if ctx.timeout.reached() {
            return;
        }
        if file.binary {
            continue;
        }
        let path = file.display_path().unwrap_or(UNKNOWN_PATH);
        if ctx.rules.file_allowed(path) {
            continue;
        }

        for segment in &file.segments {
            let eligible = segment.op == Operation::Add
                || (ctx.deletion && segment.op == Operation::Delete);
            if !eligible {
                continue;
            }
            ctx.check_rules(&Bundle {
                commit: info.clone(),
                patch: patch.text.clone(),
                content: segment.text.clone(),
                file_path: path.to_owned(),
                operation: segment.op,
                scan_type: ScanType::Patch,
                start_line: segment.start_line,
            });
        }
    }
}

/// Snapshots every file reachable from the commit's tree.
///
/// Binary and allowlisted files are skipped; each remaining file becomes
/// one bundle with its full contents. The deadline is polled before each
/// file read and stops the traversal cleanly.
pub(crate) fn scan_files_at_commit(
    git: &git2::Repository,
    ctx: &ScanContext,
    commit: &git2::Commit<'_>,
) -> Result<(), ScanError> {
    let tree = commit.tree()?;
    let info = CommitInfo::from_commit(commit);

    let mut walk_err: Option<git2::Error> = None;
    let mut deadline_hit = false;
    let walk = tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() != Some(git2::ObjectType::Blob) {
            return git2::TreeWalkResult::Ok;
        }
        if ctx.timeout.reached() {
            deadline_hit = true;
            return git2::TreeWalkResult::Abort;
        }

        let name = String::from_utf8_lossy(entry.name_bytes());
        let path = format!("{root}{name}");
        if ctx.rules.file_allowed(&path) {
            return git2::TreeWalkResult::Ok;
        }

        let object = match entry.to_object(git) {
            Ok(object) => object,
            Err(err) => {
                walk_err = Some(err);
                return git2::TreeWalkResult::Abort;
            }
        };
        if let Some(blob) = object.as_blob() {
            if blob.is_binary() {
                return git2::TreeWalkResult::Ok;
            }
            let content = String::from_utf8_lossy(blob.content()).into_owned();
            ctx.check_rules(&Bundle::snapshot(info.clone(), path, content));
        }
        git2::TreeWalkResult::Ok
    });

    if let Some(err) = walk_err {
        return Err(err.into());
    }
    match walk {
        Ok(()) => Ok(()),
        // The deadline abort is a clean stop, not a failure.
        Err(_) if deadline_hit => Ok(()),
        Err(err) => Err(err.into()),
    }
}
