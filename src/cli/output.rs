//! CLI output: error mapping from engine errors to the CLI surface.

use crate::error::VersionError;

/// Map engine errors to a string for CLI output, with a hint where the
/// user has an obvious next step.
pub fn map_error(e: &VersionError) -> String {
    match e {
        VersionError::StaleWip { .. } => {
            format!("{}\nhint: run `versa rebase` to replay your changes onto the branch head", e)
        }
        VersionError::Conflict { path } => {
            format!("{}\nhint: retry with --strategy lowest, ours or theirs, or edit {} first", e, path)
        }
        VersionError::NotFound { kind: "repository", .. } => {
            format!("{}\nhint: run `versa init` first", e)
        }
        _ => e.to_string(),
    }
}
