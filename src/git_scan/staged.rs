//! Producers for uncommitted state: staged changes and bare worktrees.
//!
//! Two paths share the sentinel commit. When HEAD resolves, the staged
//! set is enumerated (porcelain first, index status as fallback) and each
//! file contributes the inserted side of its HEAD→worktree diff. When
//! HEAD is unresolvable the repository may simply be empty, so every file
//! the worktree status reports is scanned whole.
//!
//! Worktree files that fail to open are skipped silently; read failures
//! abort the scan. NUL-sniffed binaries never become bundles. Neither
//! path spawns workers.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command;

use memchr::memchr;
use tracing::warn;

use crate::git_scan::bundle::Bundle;
use crate::git_scan::staged_diff::inserted_text;

use super::errors::ScanError;
use super::repo::Repo;

pub(crate) fn scan_uncommitted(repo: &Repo) -> Result<(), ScanError> {
    let head = match repo.repo.head() {
        Ok(head) => head,
        Err(err)
            if matches!(
                err.code(),
                git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
            ) =>
        {
            // Possibly an empty repo; either way scan what the worktree
            // holds.
            return scan_worktree_files(repo);
        }
        Err(err) => return Err(ScanError::HeadUnresolved(err)),
    };

    let head_commit = head.peel_to_commit()?;
    let prev_tree = head_commit.tree()?;
    let workdir = workdir(&repo.repo)?;
    let ctx = repo.scan_context();

    for file_name in staged_files(&repo.repo, &workdir)? {
        if ctx.timeout.reached() {
            break;
        }
        if ctx.rules.file_allowed(&file_name) {
            continue;
        }
        let Some(current) = read_worktree_file(&workdir.join(&file_name))? else {
            continue;
        };

        // HEAD-side contents; a file new to the index has none.
        let previous = match prev_tree.get_path(Path::new(&file_name)) {
            Ok(entry) => match entry.to_object(&repo.repo)?.as_blob() {
                Some(blob) => String::from_utf8_lossy(blob.content()).into_owned(),
                None => String::new(),
            },
            Err(_) => String::new(),
        };

        let content = inserted_text(&previous, &current);
        ctx.check_rules(&Bundle::uncommitted(file_name, content));
    }
    Ok(())
}

/// Empty-repo fallback: bundle every file the worktree status reports,
/// whole.
fn scan_worktree_files(repo: &Repo) -> Result<(), ScanError> {
    let workdir = workdir(&repo.repo)?;
    let mut status_opts = git2::StatusOptions::new();
    status_opts
        .include_untracked(true)
        .recurse_untracked_dirs(true);
    let statuses = repo.repo.statuses(Some(&mut status_opts))?;
    let ctx = repo.scan_context();

    for entry in statuses.iter() {
        if ctx.timeout.reached() {
            break;
        }
        let Some(path) = entry.path() else { continue };
        if ctx.rules.file_allowed(path) {
            continue;
        }
        let Some(content) = read_worktree_file(&workdir.join(path))? else {
            continue;
        };
        ctx.check_rules(&Bundle::uncommitted(path.to_owned(), content));
    }
    Ok(())
}

fn workdir(git: &git2::Repository) -> Result<PathBuf, ScanError> {
    git.workdir()
        .map(Path::to_path_buf)
        .ok_or_else(|| ScanError::Git(git2::Error::from_str("repository has no worktree")))
}

/// Reads a worktree file as text. `Ok(None)` means skip: the file could
/// not be opened or is binary.
fn read_worktree_file(path: &Path) -> Result<Option<String>, ScanError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return Ok(None),
    };
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|source| ScanError::io(path, source))?;
    if memchr(0, &bytes).is_some() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Names of files staged for commit (added, copied, or modified).
///
/// Asks git porcelain first; if the invocation fails for any reason the
/// index status answers instead, so a missing `git` binary degrades the
/// staged scan rather than aborting it.
fn staged_files(git: &git2::Repository, workdir: &Path) -> Result<Vec<String>, ScanError> {
    match porcelain_staged(workdir) {
        Ok(files) => Ok(files),
        Err(err) => {
            warn!("staged porcelain query failed, using index status: {err}");
            index_staged(git)
        }
    }
}

/// `git diff --cached --name-status --diff-filter=ACM`, parsed as
/// `status\tname` lines.
fn porcelain_staged(workdir: &Path) -> io::Result<Vec<String>> {
    let output = Command::new("git")
        .args(["diff", "--cached", "--name-status", "--diff-filter=ACM"])
        .current_dir(workdir)
        .output()?;
    if !output.status.success() {
        return Err(io::Error::other("git diff --cached exited nonzero"));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split('\t').nth(1).map(str::to_owned))
        .collect())
}

fn index_staged(git: &git2::Repository) -> Result<Vec<String>, ScanError> {
    let staged =
        git2::Status::INDEX_NEW | git2::Status::INDEX_MODIFIED | git2::Status::INDEX_TYPECHANGE;
    let mut status_opts = git2::StatusOptions::new();
    status_opts.include_untracked(false);
    let statuses = git.statuses(Some(&mut status_opts))?;

    Ok(statuses
        .iter()
        .filter(|entry| entry.status().intersects(staged))
        .filter_map(|entry| entry.path().map(str::to_owned))
        .collect())
}
