//! Scanner CLI entrypoint.
//!
//! Maps command-line flags onto the option bag, runs a history or
//! uncommitted scan, and writes the leak report. Exit codes: 0 = clean,
//! 1 = leaks found, 2 = usage or scan error.

use std::env;
use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use leakscan_rs::options::parse_duration;
use leakscan_rs::{report, Config, Manager, Options, Repo};

fn print_usage(exe: &OsStr) {
    eprintln!(
        "usage: {} [OPTIONS] <repo>

OPTIONS:
    --commit=<hash|latest>    Scan a single commit's patches
    --files-at-commit=<hash>  Scan all files at one commit
    --commits=<h1,h2,...>     Scan a comma-separated list of commits
    --commits-file=<path>     Scan commits listed in a file, one per line
    --commit-to=<hash>        Stop the history walk after this commit
    --branch=<name>           Walk a branch instead of HEAD
    --depth=<n>               Maximum commits to enter (default: unlimited)
    --threads=<n>             Worker pool size (default: logical CPUs)
    --timeout=<dur>           Wall-clock budget, e.g. 30s, 10m
    --deletion                Also scan deletion hunks
    --uncommitted             Scan staged changes instead of history
    --repo-config             Prefer the repo's .leakscan.toml
    --config=<path>           Rule configuration file
    --report=<path>           Write a report (.sarif for SARIF, else JSON)
    --help, -h                Show this help message",
        exe.to_string_lossy()
    );
}

fn parse_args() -> Result<Options, String> {
    let mut args = env::args_os();
    let exe = args.next().unwrap_or_else(|| "leakscan".into());
    let mut opts = Options::default();
    let mut repo: Option<PathBuf> = None;

    for arg in args {
        let Some(flag) = arg.to_str() else {
            // Non-UTF-8 arguments can only be the repo path.
            if repo.is_none() {
                repo = Some(PathBuf::from(&arg));
                continue;
            }
            return Err(format!("unexpected argument: {}", arg.to_string_lossy()));
        };
        if let Some(value) = flag.strip_prefix("--commit=") {
            opts.commit = Some(value.to_owned());
        } else if let Some(value) = flag.strip_prefix("--files-at-commit=") {
            opts.files_at_commit = Some(value.to_owned());
        } else if let Some(value) = flag.strip_prefix("--commits=") {
            opts.commits = Some(value.to_owned());
        } else if let Some(value) = flag.strip_prefix("--commits-file=") {
            opts.commits_file = Some(PathBuf::from(value));
        } else if let Some(value) = flag.strip_prefix("--commit-to=") {
            opts.commit_to = Some(value.to_owned());
        } else if let Some(value) = flag.strip_prefix("--branch=") {
            opts.branch = Some(value.to_owned());
        } else if let Some(value) = flag.strip_prefix("--depth=") {
            opts.depth = value
                .parse()
                .map_err(|_| format!("invalid depth: {value}"))?;
        } else if let Some(value) = flag.strip_prefix("--threads=") {
            opts.threads = value
                .parse()
                .map_err(|_| format!("invalid thread count: {value}"))?;
        } else if let Some(value) = flag.strip_prefix("--timeout=") {
            opts.timeout =
                Some(parse_duration(value).ok_or_else(|| format!("invalid timeout: {value}"))?);
        } else if let Some(value) = flag.strip_prefix("--config=") {
            opts.config_path = Some(PathBuf::from(value));
        } else if let Some(value) = flag.strip_prefix("--report=") {
            opts.report = Some(PathBuf::from(value));
        } else {
            match flag {
                "--deletion" => opts.deletion = true,
                "--uncommitted" => opts.uncommitted = true,
                "--repo-config" => opts.repo_config = true,
                "--help" | "-h" => {
                    print_usage(&exe);
                    std::process::exit(0);
                }
                _ if flag.starts_with("--") => return Err(format!("unknown flag: {flag}")),
                _ => {
                    if repo.is_some() {
                        return Err(format!("unexpected argument: {flag}"));
                    }
                    repo = Some(PathBuf::from(flag));
                }
            }
        }
    }

    opts.repo_path = repo.ok_or_else(|| "missing repository path".to_owned())?;
    Ok(opts)
}

fn write_report(path: &PathBuf, config: &Config, leaks: &[report::Leak]) -> io::Result<()> {
    let file = File::create(path)?;
    let sarif = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sarif"));
    let result = if sarif {
        report::write_sarif(file, config, leaks)
    } else {
        report::write_json(file, leaks)
    };
    result.map_err(io::Error::other)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let opts = match parse_args() {
        Ok(opts) => opts,
        Err(message) => {
            eprintln!("{message}");
            print_usage(OsStr::new("leakscan"));
            return ExitCode::from(2);
        }
    };

    let config = match &opts.config_path {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(err) => {
                error!("{err}");
                return ExitCode::from(2);
            }
        },
        None => Config::default_rules(),
    };

    let manager = Arc::new(Manager::new(opts.clone(), config.clone()));
    let mut repo = match Repo::open(&opts.repo_path, Arc::clone(&manager)) {
        Ok(repo) => repo,
        Err(err) => {
            error!("could not open {}: {err}", opts.repo_path.display());
            return ExitCode::from(2);
        }
    };

    let outcome = if opts.uncommitted {
        repo.scan_uncommitted()
    } else {
        repo.scan()
    };
    if let Err(err) = outcome {
        error!("scan failed: {err}");
        return ExitCode::from(2);
    }

    let leaks = manager.leaks();
    let timings = manager.timings();
    info!(
        leaks = leaks.len(),
        commits = manager.commit_count(),
        scan_ms = timings.scan.as_millis() as u64,
        "scan complete"
    );

    if let Some(path) = &opts.report {
        if let Err(err) = write_report(path, &config, &leaks) {
            error!("could not write report {}: {err}", path.display());
            return ExitCode::from(2);
        }
    } else if !leaks.is_empty() {
        if let Err(err) = report::write_json(io::stdout().lock(), &leaks) {
            error!("could not write leaks: {err}");
            return ExitCode::from(2);
        }
        println!();
    }

    if leaks.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
