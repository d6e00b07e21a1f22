//! History walker feeding the worker pool.
//!
//! Walks the commit log from the selected tip in the order the revision
//! walker supplies. For every non-root commit the patch against its
//! **first parent only** is generated here on the producer thread, then
//! handed to the dispatcher; merge side-branches are reached as the tips
//! of other visited histories, and visiting every parent would rescan
//! them. Roots are snapshot-scanned inline without a worker.
//!
//! The budget gate is polled between commits; allowlisted commits are
//! skipped without counting; the walk stops after dispatching the
//! terminal commit when one is configured.

use std::time::Instant;

use tracing::error;

use crate::git_scan::bundle::CommitInfo;
use crate::git_scan::patch::generate_commit_patch;
use crate::manager::TimeKind;

use super::commit::{scan_files_at_commit, scan_patch};
use super::dispatch::Dispatcher;
use super::errors::ScanError;
use super::repo::Repo;

pub(crate) fn scan_history(repo: &mut Repo) -> Result<(), ScanError> {
    let ctx = repo.scan_context();
    let branch = repo.manager.opts().branch.clone();
    let threads = repo.manager.opts().threads;

    let git = &repo.repo;
    let budget = &mut repo.budget;

    let mut revwalk = git.revwalk()?;
    // Sorting must be configured before pushing: changing it resets the
    // walker.
    revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;
    match branch.as_deref() {
        Some(branch) => {
            let branch_ref = git.find_branch(branch, git2::BranchType::Local)?;
            let target = branch_ref
                .get()
                .target()
                .ok_or_else(|| git2::Error::from_str("branch has no direct target"))?;
            revwalk.push(target)?;
        }
        None => revwalk.push_head()?,
    }

    let dispatcher = Dispatcher::new(threads).map_err(ScanError::WorkerSpawn)?;
    let mut entered = 0usize;
    let mut failure: Option<ScanError> = None;

    for next in revwalk {
        let oid = match next {
            Ok(oid) => oid,
            Err(err) => {
                failure = Some(err.into());
                break;
            }
        };
        if budget.timeout_reached() || budget.depth_reached(entered) {
            break;
        }

        let hash = oid.to_string();
        if ctx.rules.commit_allowed(&hash) {
            // Allowlisted commits are skipped without counting.
            continue;
        }

        let commit = match git.find_commit(oid) {
            Ok(commit) => commit,
            Err(err) => {
                failure = Some(err.into());
                break;
            }
        };

        if commit.parent_count() == 0 {
            entered += 1;
            if let Err(err) = scan_files_at_commit(git, &ctx, &commit) {
                failure = Some(err);
                break;
            }
            continue;
        }

        entered += 1;
        let parent = match commit.parent(0) {
            Ok(parent) => parent,
            Err(err) => {
                failure = Some(err.into());
                break;
            }
        };

        let started = Instant::now();
        match generate_commit_patch(git, &parent, &commit) {
            Ok(Some(patch)) => {
                ctx.manager.record_time(TimeKind::Patch, started.elapsed());
                let info = CommitInfo::from_commit(&commit);
                let task_ctx = ctx.clone();
                dispatcher.submit(Box::new(move || scan_patch(&task_ctx, &info, &patch)));
            }
            Ok(None) => {
                // Generation panicked; the commit is skipped, the walk
                // survives.
                ctx.manager.record_time(TimeKind::Patch, started.elapsed());
            }
            Err(err) => {
                error!(commit = %hash, "could not generate patch: {err}");
            }
        }

        if budget.commit_to_reached(&hash) {
            break;
        }
    }

    dispatcher.drain();
    repo.manager.increment_commits(entered);

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
