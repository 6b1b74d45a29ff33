//! Integration tests for the CLI route table over a sled-backed workspace

use clap::Parser;
use std::path::Path;
use tempfile::TempDir;
use versa::cli::{map_error, Cli, RunContext};
use versa::config::VersaConfig;
use versa::types::Operator;
use versa::VersionError;

/// Parse and run one command line in a fresh context, as the binary does.
fn run(workspace: &Path, user: &str, args: &[&str]) -> Result<String, VersionError> {
    let mut argv = vec!["versa"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();

    let mut config = VersaConfig::default();
    config.resolve_paths(workspace);
    let ctx = RunContext::with_config(config, workspace, cli.repo.clone(), Operator::new(user, format!("{user}@example.com")))?;
    ctx.execute(&cli.command)
}

#[test]
fn test_branch_and_merge_across_invocations() {
    let temp_dir = TempDir::new().unwrap();
    let ws = temp_dir.path();
    std::fs::write(ws.join("a1.txt"), "alpha one").unwrap();
    std::fs::write(ws.join("a2.txt"), "alpha two").unwrap();
    std::fs::write(ws.join("b.txt"), "beta").unwrap();

    let out = run(ws, "alice", &["init"]).unwrap();
    assert!(out.contains("on branch main"));

    run(ws, "alice", &["add", "a.txt", ws.join("a1.txt").to_str().unwrap()]).unwrap();
    run(ws, "alice", &["commit", "-m", "init"]).unwrap();
    run(ws, "alice", &["branch", "create", "feature"]).unwrap();
    run(ws, "alice", &["checkout", "feature"]).unwrap();
    run(ws, "alice", &["replace", "a.txt", ws.join("a2.txt").to_str().unwrap()]).unwrap();
    run(ws, "alice", &["add", "b.txt", ws.join("b.txt").to_str().unwrap()]).unwrap();

    let status = run(ws, "alice", &["status"]).unwrap();
    assert_eq!(status.lines().count(), 2);

    run(ws, "alice", &["commit", "-m", "feature work"]).unwrap();
    run(ws, "alice", &["checkout", "main"]).unwrap();
    let out = run(ws, "alice", &["merge", "feature", "--strategy", "lowest"]).unwrap();
    assert!(out.starts_with("fast-forward"));

    assert_eq!(run(ws, "alice", &["cat", "a.txt"]).unwrap(), "alpha two");
    let ls = run(ws, "alice", &["ls"]).unwrap();
    assert!(ls.contains("a.txt"));
    assert!(ls.contains("b.txt"));

    let log = run(ws, "alice", &["log", "-n", "5"]).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("feature work"));

    let branches = run(ws, "alice", &["branch", "list"]).unwrap();
    assert!(branches.contains("* main"));
    assert!(branches.contains("  feature"));

    let diff = run(ws, "alice", &["diff", "main~", "main"]);
    assert!(matches!(diff, Err(VersionError::InvalidHash(_))));
}

#[test]
fn test_stale_commit_hint() {
    let temp_dir = TempDir::new().unwrap();
    let ws = temp_dir.path();
    std::fs::write(ws.join("f.txt"), "f").unwrap();
    std::fs::write(ws.join("g.txt"), "g").unwrap();
    let f = ws.join("f.txt");
    let g = ws.join("g.txt");

    run(ws, "alice", &["init"]).unwrap();
    run(ws, "alice", &["add", "f.txt", f.to_str().unwrap()]).unwrap();
    run(ws, "bob", &["add", "g.txt", g.to_str().unwrap()]).unwrap();
    run(ws, "alice", &["commit", "-m", "alice"]).unwrap();

    let err = run(ws, "bob", &["commit", "-m", "bob"]).unwrap_err();
    assert!(matches!(err, VersionError::StaleWip { .. }));
    assert!(map_error(&err).contains("versa rebase"));

    run(ws, "bob", &["rebase"]).unwrap();
    run(ws, "bob", &["commit", "-m", "bob"]).unwrap();
    let ls = run(ws, "bob", &["ls"]).unwrap();
    assert!(ls.contains("f.txt") && ls.contains("g.txt"));
}

#[test]
fn test_uninitialized_workspace() {
    let temp_dir = TempDir::new().unwrap();
    let err = run(temp_dir.path(), "alice", &["status"]).unwrap_err();
    assert!(map_error(&err).contains("versa init"));
}
