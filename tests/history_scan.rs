//! End-to-end history and commit-mode scans against real repositories.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use leakscan_rs::git_scan::ScanError;
use leakscan_rs::{Config, Manager, Options, Repo};

const RULES: &str = r#"
[[rules]]
description = "Test Secret"
regex = '''SECRET_[A-Z0-9]+'''
tags = ["test"]
keywords = ["SECRET_"]
"#;

fn test_config() -> Config {
    Config::from_toml_str(RULES).unwrap()
}

fn init_repo(dir: &Path) -> git2::Repository {
    git2::Repository::init(dir).unwrap()
}

/// Writes `name` in the worktree, stages it, and commits on HEAD.
fn commit_file(repo: &git2::Repository, name: &str, content: &str, message: &str) -> git2::Oid {
    let workdir = repo.workdir().unwrap();
    fs::write(workdir.join(name), content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

    let sig =
        git2::Signature::new("Alice", "alice@example.com", &git2::Time::new(1_700_000_000, 0))
            .unwrap();
    let parent = repo.head().ok().map(|head| head.peel_to_commit().unwrap());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

fn scan_with(dir: &Path, opts: Options, config: Config) -> (Arc<Manager>, Result<(), ScanError>) {
    let manager = Arc::new(Manager::new(opts, config));
    let mut repo = Repo::open(dir, Arc::clone(&manager)).unwrap();
    let result = repo.scan();
    (manager, result)
}

fn offenders(manager: &Manager) -> HashSet<String> {
    manager.leaks().into_iter().map(|l| l.offender).collect()
}

#[test]
fn root_only_repo_scans_files_at_the_root() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let root = commit_file(&repo, "x.py", "aws = SECRET_ROOT1\n", "initial");

    let (manager, result) = scan_with(dir.path(), Options::default(), test_config());
    result.unwrap();

    let leaks = manager.leaks();
    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].offender, "SECRET_ROOT1");
    assert_eq!(leaks[0].file, "x.py");
    assert_eq!(leaks[0].commit, root.to_string());
    assert_eq!(leaks[0].operation, "addition");
    assert_eq!(leaks[0].line, "aws = SECRET_ROOT1");
    assert_eq!(leaks[0].line_number, 1);
    assert_eq!(leaks[0].author, "Alice");
    assert_eq!(manager.commit_count(), 1);
}

#[test]
fn two_commit_history_reports_additions_only_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "x.txt", "alpha\nSECRET_ONE\n", "add");
    let second = commit_file(&repo, "x.txt", "alpha\nSECRET_TWO\n", "edit");

    let (manager, result) = scan_with(dir.path(), Options::default(), test_config());
    result.unwrap();

    assert_eq!(
        offenders(&manager),
        HashSet::from(["SECRET_ONE".to_owned(), "SECRET_TWO".to_owned()])
    );
    let leaks = manager.leaks();
    assert_eq!(leaks.len(), 2);
    let two = leaks.iter().find(|l| l.offender == "SECRET_TWO").unwrap();
    assert_eq!(two.commit, second.to_string());
    assert_eq!(two.operation, "addition");
    assert_eq!(manager.commit_count(), 2);
}

#[test]
fn deletion_toggle_adds_delete_hunks() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "x.txt", "alpha\nSECRET_ONE\n", "add");
    let second = commit_file(&repo, "x.txt", "alpha\nSECRET_TWO\n", "edit");

    let opts = Options {
        deletion: true,
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    result.unwrap();

    let leaks = manager.leaks();
    assert_eq!(leaks.len(), 3);
    let deleted = leaks
        .iter()
        .find(|l| l.operation == "deletion")
        .expect("deletion leak");
    assert_eq!(deleted.offender, "SECRET_ONE");
    assert_eq!(deleted.commit, second.to_string());
}

#[test]
fn depth_caps_the_commits_entered() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    for i in 1..=10 {
        commit_file(
            &repo,
            &format!("f{i}.txt"),
            &format!("SECRET_N{i}\n"),
            &format!("commit {i}"),
        );
    }

    let opts = Options {
        depth: 3,
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    result.unwrap();

    assert_eq!(manager.commit_count(), 3);
    assert_eq!(
        offenders(&manager),
        HashSet::from([
            "SECRET_N10".to_owned(),
            "SECRET_N9".to_owned(),
            "SECRET_N8".to_owned(),
        ])
    );
}

#[test]
fn commit_to_stops_after_dispatching_the_terminal_commit() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let mut hashes = Vec::new();
    for i in 1..=5 {
        hashes.push(commit_file(
            &repo,
            &format!("f{i}.txt"),
            &format!("SECRET_N{i}\n"),
            &format!("commit {i}"),
        ));
    }

    let opts = Options {
        commit_to: Some(hashes[2].to_string()),
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    result.unwrap();

    assert_eq!(manager.commit_count(), 3);
    assert_eq!(
        offenders(&manager),
        HashSet::from([
            "SECRET_N5".to_owned(),
            "SECRET_N4".to_owned(),
            "SECRET_N3".to_owned(),
        ])
    );
}

#[test]
fn allowlisted_commits_are_skipped_without_counting() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "x.txt", "alpha\nSECRET_ONE\n", "add");
    let second = commit_file(&repo, "x.txt", "alpha\nSECRET_TWO\n", "edit");

    let config = Config::from_toml_str(&format!(
        "{RULES}\n[allowlist]\ncommits = [\"{second}\"]\n"
    ))
    .unwrap();
    let (manager, result) = scan_with(dir.path(), Options::default(), config);
    result.unwrap();

    assert_eq!(offenders(&manager), HashSet::from(["SECRET_ONE".to_owned()]));
    assert_eq!(manager.commit_count(), 1);
}

#[test]
fn single_commit_mode_scans_one_patch() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "x.txt", "alpha\nSECRET_ONE\n", "add");
    let second = commit_file(&repo, "x.txt", "alpha\nSECRET_TWO\n", "edit");

    let opts = Options {
        commit: Some(second.to_string()),
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    result.unwrap();

    assert_eq!(offenders(&manager), HashSet::from(["SECRET_TWO".to_owned()]));
    assert_eq!(manager.commit_count(), 1);
}

#[test]
fn latest_resolves_to_head() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "x.txt", "alpha\n", "add");
    commit_file(&repo, "x.txt", "alpha\nSECRET_HEAD\n", "edit");

    let opts = Options {
        commit: Some("latest".to_owned()),
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    result.unwrap();

    assert_eq!(offenders(&manager), HashSet::from(["SECRET_HEAD".to_owned()]));
}

#[test]
fn files_at_commit_snapshots_every_file() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let first = commit_file(&repo, "x.txt", "alpha\nSECRET_ONE\n", "add");
    commit_file(&repo, "x.txt", "alpha\nSECRET_TWO\n", "edit");

    let opts = Options {
        files_at_commit: Some(first.to_string()),
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    result.unwrap();

    let leaks = manager.leaks();
    assert_eq!(offenders(&manager), HashSet::from(["SECRET_ONE".to_owned()]));
    assert_eq!(leaks[0].line_number, 2);
    assert_eq!(manager.commit_count(), 1);
}

#[test]
fn commit_list_mode_scans_each_reference() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let first = commit_file(&repo, "x.txt", "alpha\nSECRET_ONE\n", "add");
    let second = commit_file(&repo, "x.txt", "alpha\nSECRET_TWO\n", "edit");

    let opts = Options {
        commits: Some(format!("{first},{second}")),
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    result.unwrap();

    assert_eq!(
        offenders(&manager),
        HashSet::from(["SECRET_ONE".to_owned(), "SECRET_TWO".to_owned()])
    );
    assert_eq!(manager.commit_count(), 2);
}

#[test]
fn commit_list_stops_on_the_first_bad_reference() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let first = commit_file(&repo, "x.txt", "alpha\nSECRET_ONE\n", "add");

    let opts = Options {
        commits: Some(format!(
            "{first},{}",
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        )),
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    assert!(matches!(result, Err(ScanError::CommitNotFound { .. })));
    // The first reference was still scanned and counted.
    assert_eq!(offenders(&manager), HashSet::from(["SECRET_ONE".to_owned()]));
    assert_eq!(manager.commit_count(), 2);
}

#[test]
fn commits_file_mode_reads_one_reference_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let first = commit_file(&repo, "x.txt", "alpha\nSECRET_ONE\n", "add");
    let second = commit_file(&repo, "x.txt", "alpha\nSECRET_TWO\n", "edit");

    let list = dir.path().join("commits.txt");
    fs::write(&list, format!("{first}\n\n{second}\n")).unwrap();

    let opts = Options {
        commits_file: Some(list),
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    result.unwrap();

    assert_eq!(
        offenders(&manager),
        HashSet::from(["SECRET_ONE".to_owned(), "SECRET_TWO".to_owned()])
    );
}

#[test]
fn branch_option_walks_the_named_branch() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "x.txt", "SECRET_BRANCH1\n", "add");
    let branch = repo.head().unwrap().shorthand().unwrap().to_owned();

    let opts = Options {
        branch: Some(branch),
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    result.unwrap();
    assert_eq!(
        offenders(&manager),
        HashSet::from(["SECRET_BRANCH1".to_owned()])
    );
}

#[test]
fn repo_without_commits_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());

    let (_manager, result) = scan_with(dir.path(), Options::default(), test_config());
    assert!(matches!(result, Err(ScanError::EmptyRepo { .. })));
}

#[test]
fn unknown_commit_reference_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "x.txt", "alpha\n", "add");

    let opts = Options {
        commit: Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_owned()),
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    assert!(matches!(result, Err(ScanError::CommitNotFound { .. })));
    // The resolver counts before the lookup, regardless of success.
    assert_eq!(manager.commit_count(), 1);
}

#[test]
fn expired_timeout_truncates_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    for i in 1..=5 {
        commit_file(
            &repo,
            &format!("f{i}.txt"),
            &format!("SECRET_N{i}\n"),
            &format!("commit {i}"),
        );
    }

    let opts = Options {
        timeout: Some(Duration::from_nanos(1)),
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    result.unwrap();
    assert_eq!(manager.leak_count(), 0);
    assert_eq!(manager.commit_count(), 0);
}

#[test]
fn repo_config_replaces_the_manager_rules() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "x.txt", "SECRET_ONE\nOTHER_A1\n", "add");

    fs::write(
        dir.path().join(".leakscan.toml"),
        r#"
[[rules]]
description = "Other Secret"
regex = '''OTHER_[A-Z0-9]+'''
"#,
    )
    .unwrap();

    let opts = Options {
        repo_config: true,
        ..Options::default()
    };
    let (manager, result) = scan_with(dir.path(), opts, test_config());
    result.unwrap();

    let leaks = manager.leaks();
    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].offender, "OTHER_A1");
    assert_eq!(leaks[0].rule, "Other Secret");
}

#[test]
fn allowlisted_files_never_become_bundles() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "secrets.lock", "SECRET_LOCKED\n", "add lock");
    commit_file(&repo, "code.txt", "SECRET_CODE\n", "add code");

    let config = Config::from_toml_str(&format!(
        "{RULES}\n[allowlist]\nfiles = ['''\\.lock$''']\n"
    ))
    .unwrap();
    let (manager, result) = scan_with(dir.path(), Options::default(), config);
    result.unwrap();

    assert_eq!(offenders(&manager), HashSet::from(["SECRET_CODE".to_owned()]));
}

#[test]
fn merge_commits_follow_the_first_parent_only() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let base = commit_file(&repo, "base.txt", "base\n", "base");

    // Side branch adds its own secret.
    let side_tree = {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join("side.txt"), "SECRET_SIDE1\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("side.txt")).unwrap();
        index.write().unwrap();
        repo.find_tree(index.write_tree().unwrap()).unwrap()
    };
    let sig =
        git2::Signature::new("Alice", "alice@example.com", &git2::Time::new(1_700_000_000, 0))
            .unwrap();
    let base_commit = repo.find_commit(base).unwrap();
    let side = repo
        .commit(None, &sig, &sig, "side", &side_tree, &[&base_commit])
        .unwrap();

    // Merge the side branch into HEAD; the merged tree carries side.txt.
    let side_commit = repo.find_commit(side).unwrap();
    let head_commit = repo.head().unwrap().peel_to_commit().unwrap();
    let merge = repo
        .commit(
            Some("HEAD"),
            &sig,
            &sig,
            "merge side",
            &side_commit.tree().unwrap(),
            &[&head_commit, &side_commit],
        )
        .unwrap();

    let (manager, result) = scan_with(dir.path(), Options::default(), test_config());
    result.unwrap();

    // The merge is diffed against its first parent only; the side
    // branch's own commit reports the secret when the walk reaches it as
    // a tip of that history. At most one report per commit, and never
    // from anywhere else.
    let leaks = manager.leaks();
    let side_leaks: Vec<_> = leaks
        .iter()
        .filter(|l| l.offender == "SECRET_SIDE1")
        .collect();
    assert!(!side_leaks.is_empty());
    assert!(side_leaks.len() <= 2);
    assert!(side_leaks
        .iter()
        .all(|l| l.commit == merge.to_string() || l.commit == side.to_string()));
    let commits: HashSet<_> = side_leaks.iter().map(|l| l.commit.clone()).collect();
    assert_eq!(commits.len(), side_leaks.len());
}
