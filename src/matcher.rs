//! Rule evaluation over bundles.
//!
//! A [`RuleSet`] is the compiled form of a [`Config`]: rule regexes, the
//! allowlist, and a keyword pre-gate. The gate is an Aho-Corasick scan
//! over every rule's literal keywords; only rules whose keywords appear
//! in the content (plus rules that declare no keywords) pay for a regex
//! pass. Clean content is rejected with a single automaton sweep.
//!
//! Line numbers are derived per scan type: patch content is anchored at
//! its segment's post-image start line, commit snapshots start at line 1,
//! and uncommitted content is approximate by construction.

use std::collections::BTreeSet;
use std::sync::Arc;

use aho_corasick::AhoCorasick;
use memchr::memchr_iter;
use tracing::debug;

use crate::config::Config;
use crate::git_scan::bundle::Bundle;
use crate::manager::Manager;
use crate::report::Leak;

/// Compiled rules plus the keyword pre-gate. Cheap to clone; workers each
/// hold one.
#[derive(Clone, Debug)]
pub struct RuleSet {
    config: Arc<Config>,
    /// Keyword automaton over all rules' keywords, if any rule has them.
    gate: Option<Arc<AhoCorasick>>,
    /// Maps automaton pattern index → rule index.
    pattern_rules: Arc<Vec<usize>>,
    /// Rules with no keywords; always evaluated.
    ungated: Arc<Vec<usize>>,
}

impl RuleSet {
    /// Compiles the gate for a configuration.
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        let mut patterns = Vec::new();
        let mut pattern_rules = Vec::new();
        let mut ungated = Vec::new();
        for (idx, rule) in config.rules.iter().enumerate() {
            if rule.keywords.is_empty() {
                ungated.push(idx);
            } else {
                for keyword in &rule.keywords {
                    patterns.push(keyword.clone());
                    pattern_rules.push(idx);
                }
            }
        }

        let gate = if patterns.is_empty() {
            None
        } else {
            match AhoCorasick::new(&patterns) {
                Ok(ac) => Some(Arc::new(ac)),
                // Degenerate keyword sets lose the gate, not the rules.
                Err(err) => {
                    debug!("keyword gate disabled: {err}");
                    ungated = (0..config.rules.len()).collect();
                    None
                }
            }
        };

        Self {
            config,
            gate,
            pattern_rules: Arc::new(pattern_rules),
            ungated: Arc::new(ungated),
        }
    }

    /// The configuration this set was compiled from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// True when the file name or path is allowlisted.
    #[must_use]
    pub fn file_allowed(&self, path: &str) -> bool {
        self.config.allowlist.file_allowed(path)
    }

    /// True when the commit hash is allowlisted.
    #[must_use]
    pub fn commit_allowed(&self, hash: &str) -> bool {
        self.config.allowlist.commit_allowed(hash)
    }

    /// Runs every applicable rule over the bundle and appends leaks to
    /// the manager's sink. Thread-safe and idempotent per bundle.
    pub fn check_rules(&self, bundle: &Bundle, repo_name: &str, manager: &Manager) {
        if bundle.content.is_empty() || self.file_allowed(&bundle.file_path) {
            return;
        }

        for idx in self.candidate_rules(&bundle.content) {
            let rule = &self.config.rules[idx];
            if !rule.applies_to(&bundle.file_path) {
                continue;
            }
            for found in rule.regex.find_iter(&bundle.content) {
                let offender = found.as_str();
                if self.config.allowlist.regex_allowed(offender) {
                    continue;
                }
                let (line_number, line) = locate(bundle, found.start());
                manager.send_leak(Leak {
                    line,
                    line_number,
                    offender: offender.to_owned(),
                    commit: bundle.commit.hash.clone(),
                    repo: repo_name.to_owned(),
                    rule: rule.description.clone(),
                    commit_message: bundle.commit.message.clone(),
                    author: bundle.commit.author.clone(),
                    email: bundle.commit.email.clone(),
                    file: bundle.file_path.clone(),
                    date: bundle.commit.when,
                    tags: rule.tags.join(", "),
                    operation: bundle.operation.to_string(),
                });
            }
        }
    }

    /// Rule indices worth evaluating for this content, in rule order.
    fn candidate_rules(&self, content: &str) -> Vec<usize> {
        let mut candidates: BTreeSet<usize> = self.ungated.iter().copied().collect();
        if let Some(gate) = &self.gate {
            for hit in gate.find_overlapping_iter(content) {
                candidates.insert(self.pattern_rules[hit.pattern().as_usize()]);
            }
        }
        candidates.into_iter().collect()
    }
}

/// Maps a match offset to a source line number and the full line text.
///
/// The number is `start_line` plus the newlines preceding the offset,
/// which is exact for patch segments and commit snapshots and
/// approximate for uncommitted content.
fn locate(bundle: &Bundle, offset: usize) -> (u32, String) {
    let content = bundle.content.as_str();
    let preceding = memchr_iter(b'\n', content[..offset].as_bytes()).count();
    let line_number = bundle.start_line.saturating_add(preceding as u32);

    let line_start = content[..offset].rfind('\n').map_or(0, |pos| pos + 1);
    let line_end = content[offset..]
        .find('\n')
        .map_or(content.len(), |pos| offset + pos);
    (line_number, content[line_start..line_end].to_owned())
}
