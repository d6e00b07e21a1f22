//! Repository handle for scanning.
//!
//! [`Repo`] owns the git repository, the manager handle, the active rule
//! set, and the budget gate for the current scan. The repository itself
//! is only ever read on the producer thread; workers receive
//! [`ScanContext`] clones plus owned patch data, so nothing races the
//! object store.

use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, ConfigError, REPO_CONFIG_FILE};
use crate::git_scan::budget::{BudgetGate, TimeoutGate};
use crate::git_scan::bundle::Bundle;
use crate::manager::Manager;
use crate::matcher::RuleSet;

use super::errors::ScanError;

/// A repository bound to a manager for one or more scans.
pub struct Repo {
    pub(crate) repo: git2::Repository,
    pub(crate) name: String,
    pub(crate) manager: Arc<Manager>,
    pub(crate) rules: RuleSet,
    pub(crate) budget: BudgetGate,
}

impl Repo {
    /// Opens the repository at `path` under the manager's options and
    /// configuration.
    pub fn open(path: &Path, manager: Arc<Manager>) -> Result<Self, ScanError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let repo = git2::Repository::open(path)?;
        Ok(Self::from_repository(repo, name, manager))
    }

    /// Wraps an already-open repository. Used by callers that create or
    /// discover repositories themselves.
    #[must_use]
    pub fn from_repository(
        repo: git2::Repository,
        name: impl Into<String>,
        manager: Arc<Manager>,
    ) -> Self {
        let opts = manager.opts();
        let budget = BudgetGate::new(opts.timeout, opts.depth, opts.commit_to.clone());
        let rules = RuleSet::new(Arc::new(manager.config().clone()));
        Self {
            repo,
            name: name.into(),
            manager,
            rules,
            budget,
        }
    }

    /// The repository name used in leak records.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The manager this repo reports into.
    #[must_use]
    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    /// Cooperative cancel flag; setting it stops the scan between units.
    #[must_use]
    pub fn cancel_flag(&self) -> std::sync::Arc<std::sync::atomic::AtomicBool> {
        self.budget.cancel_flag()
    }

    /// The context workers and producers evaluate bundles under.
    #[must_use]
    pub(crate) fn scan_context(&self) -> ScanContext {
        ScanContext {
            rules: self.rules.clone(),
            manager: Arc::clone(&self.manager),
            timeout: self.budget.timeout_gate(),
            deletion: self.manager.opts().deletion,
            repo_name: self.name.clone(),
        }
    }

    /// Loads the repo-local configuration file from the worktree root.
    ///
    /// Bare repositories have no worktree to read from; the manager's
    /// configuration stays active.
    pub(crate) fn load_repo_config(&self) -> Result<Option<Config>, ConfigError> {
        let Some(workdir) = self.repo.workdir() else {
            return Ok(None);
        };
        let path = workdir.join(REPO_CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Config::load(&path).map(Some)
    }

    /// Installs `config` as the active rule set for subsequent scans.
    pub(crate) fn install_config(&mut self, config: Config) {
        self.rules = RuleSet::new(Arc::new(config));
    }
}

/// Everything bundle evaluation needs, detached from the repository so it
/// can cross into workers.
#[derive(Clone)]
pub(crate) struct ScanContext {
    pub(crate) rules: RuleSet,
    pub(crate) manager: Arc<Manager>,
    pub(crate) timeout: TimeoutGate,
    pub(crate) deletion: bool,
    pub(crate) repo_name: String,
}

impl ScanContext {
    /// Runs the matcher on one bundle.
    pub(crate) fn check_rules(&self, bundle: &Bundle) {
        self.rules.check_rules(bundle, &self.repo_name, &self.manager);
    }
}
