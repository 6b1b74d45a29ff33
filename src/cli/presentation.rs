//! CLI presentation: text and json formatters per command family.

use crate::diff::Changes;
use crate::error::{StorageError, VersionError};
use crate::object::{Branch, Commit, TreeEntry};
use serde::Serialize;

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, VersionError> {
    serde_json::to_string_pretty(value).map_err(|e| StorageError::Codec(e.to_string()).into())
}

fn wants_json(format: &str) -> Result<bool, VersionError> {
    match format {
        "text" => Ok(false),
        "json" => Ok(true),
        other => Err(VersionError::ConfigError(format!(
            "Invalid output format: {} (must be 'text' or 'json')",
            other
        ))),
    }
}

pub fn format_changes(changes: &Changes, format: &str) -> Result<String, VersionError> {
    if wants_json(format)? {
        let items: Vec<_> = changes.iter().collect();
        return to_json(&items);
    }
    if changes.is_empty() {
        return Ok("No changes".to_string());
    }
    Ok(changes.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))
}

pub fn format_log(commits: &[Commit], format: &str) -> Result<String, VersionError> {
    if wants_json(format)? {
        return to_json(commits);
    }
    if commits.is_empty() {
        return Ok("No commits yet".to_string());
    }
    let lines: Vec<String> = commits
        .iter()
        .map(|c| {
            let summary = c.message.lines().next().unwrap_or("");
            let merge = if c.is_merge() { " (merge)" } else { "" };
            format!(
                "{} {} {}{} {}",
                c.hash.short(),
                c.committer.when.format("%Y-%m-%d %H:%M:%S"),
                c.author.name,
                merge,
                summary
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

pub fn format_branches(branches: &[Branch], current: Option<&str>) -> String {
    if branches.is_empty() {
        return "No branches".to_string();
    }
    branches
        .iter()
        .map(|b| {
            let marker = if Some(b.name.as_str()) == current { "*" } else { " " };
            let head = b.head.map_or_else(|| "(unborn)".to_string(), |h| h.short());
            format!("{} {} {}", marker, b.name, head)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_entries(entries: &[TreeEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            let kind = if e.is_dir { "tree" } else { "blob" };
            let suffix = if e.is_dir { "/" } else { "" };
            format!("{} {} {}{}", kind, e.hash.short(), e.name, suffix)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_leaves(leaves: &[(String, TreeEntry)]) -> String {
    leaves
        .iter()
        .map(|(path, e)| format!("blob {} {}", e.hash.short(), path))
        .collect::<Vec<_>>()
        .join("\n")
}
