//! Scan orchestration: mode selection and entry points.
//!
//! `scan()` runs exactly one production path, chosen by the first set
//! mode option: single commit, files at a commit, a comma-separated
//! commit list, a commits file, or the default history walk. Budget
//! exhaustion ends any path cleanly; only real failures surface as
//! errors. `scan_uncommitted()` is the separate staged/worktree entry
//! point.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::Instant;

use crate::manager::TimeKind;

use super::commit::{resolve_commit, scan_commit_patches, scan_files_at_commit};
use super::errors::ScanError;
use super::repo::Repo;
use super::{staged, walk};

impl Repo {
    /// Scans the repository's history, or whatever single-commit mode
    /// the options select.
    ///
    /// # Errors
    /// Setup failures, unresolvable references, and object-store I/O
    /// abort the scan. A fired timeout or depth budget is not an error.
    pub fn scan(&mut self) -> Result<(), ScanError> {
        self.budget.arm();
        if self.repo.is_empty()? {
            return Err(ScanError::EmptyRepo {
                name: self.name.clone(),
            });
        }
        self.refresh_repo_config()?;

        let started = Instant::now();
        let result = self.run_mode();
        self.manager.record_time(TimeKind::Scan, started.elapsed());
        result
    }

    /// Scans staged changes, falling back to the whole worktree when the
    /// repository has no commits yet.
    pub fn scan_uncommitted(&mut self) -> Result<(), ScanError> {
        self.budget.arm();
        self.refresh_repo_config()?;

        let started = Instant::now();
        let result = staged::scan_uncommitted(self);
        self.manager.record_time(TimeKind::Scan, started.elapsed());
        result
    }

    /// Swaps in the repo-local configuration when the option asks for it
    /// and the file exists.
    fn refresh_repo_config(&mut self) -> Result<(), ScanError> {
        if !self.manager.opts().repo_config {
            return Ok(());
        }
        if let Some(config) = self.load_repo_config()? {
            self.install_config(config);
        }
        Ok(())
    }

    /// The first matching mode wins; all other mode options are ignored.
    fn run_mode(&mut self) -> Result<(), ScanError> {
        let opts = self.manager.opts().clone();

        if let Some(reference) = &opts.commit {
            let ctx = self.scan_context();
            let commit = resolve_commit(&self.repo, &self.manager, reference)?;
            return scan_commit_patches(&self.repo, &ctx, &commit);
        }

        if let Some(reference) = &opts.files_at_commit {
            let ctx = self.scan_context();
            let commit = resolve_commit(&self.repo, &self.manager, reference)?;
            return scan_files_at_commit(&self.repo, &ctx, &commit);
        }

        if let Some(commits) = &opts.commits {
            let ctx = self.scan_context();
            for reference in commits.split(',') {
                let commit = resolve_commit(&self.repo, &self.manager, reference)?;
                scan_commit_patches(&self.repo, &ctx, &commit)?;
            }
            return Ok(());
        }

        if let Some(path) = &opts.commits_file {
            let file = File::open(path).map_err(|source| ScanError::io(path, source))?;
            let ctx = self.scan_context();
            for line in BufReader::new(file).lines() {
                let line = line.map_err(|source| ScanError::io(path, source))?;
                let reference = line.trim();
                if reference.is_empty() {
                    continue;
                }
                let commit = resolve_commit(&self.repo, &self.manager, reference)?;
                scan_commit_patches(&self.repo, &ctx, &commit)?;
            }
            return Ok(());
        }

        walk::scan_history(self)
    }
}
