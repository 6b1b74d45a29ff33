//! Branch name validation

use crate::error::VersionError;

pub const MAX_BRANCH_NAME_LEN: usize = 128;

/// Reject names that would be ambiguous in refs or paths.
pub fn validate_branch_name(name: &str) -> Result<(), VersionError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.len() > MAX_BRANCH_NAME_LEN {
        Some("name is longer than 128 bytes")
    } else if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("name contains whitespace or control characters")
    } else if name.contains("..") {
        Some("name contains '..'")
    } else if name.starts_with('/') || name.ends_with('/') {
        Some("name starts or ends with '/'")
    } else if name.starts_with('.') || name.ends_with('.') {
        Some("name starts or ends with '.'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(VersionError::InvalidBranchName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
