//! Error types for the version-management engine.

use crate::types::Hash;
use thiserror::Error;

/// Storage-related errors raised by store backends and block adapters.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} already exists: {key}")]
    AlreadyExists { kind: &'static str, key: String },

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: Hash, actual: Hash },

    #[error("Length mismatch for {address}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        address: String,
        expected: u64,
        actual: u64,
    },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Codec(err.to_string())
    }
}

/// Engine errors. All are local, recoverable conditions surfaced to the caller.
///
/// Early termination of a traversal is not an error: visitors return
/// `ControlFlow::Break(())` instead.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Entry already exists: {0}")]
    EntryExists(String),

    #[error("Path passes through a file, blob must be a leaf: {0}")]
    BlobMustBeLeaf(String),

    #[error("Not a directory: {0}")]
    NotDirectory(String),

    #[error("Unresolved merge conflict at {path}")]
    Conflict { path: String },

    #[error("Wip is stale: based on {base:?}, branch head is {head:?}")]
    StaleWip {
        base: Option<Hash>,
        head: Option<Hash>,
    },

    #[error("{operation} is not allowed in state {actual}, expected {expected}")]
    InvalidState {
        operation: &'static str,
        expected: &'static str,
        actual: String,
    },

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("Branch already exists: {0}")]
    BranchExists(String),

    #[error("Invalid branch name {name:?}: {reason}")]
    InvalidBranchName { name: String, reason: &'static str },

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Merge recursion exceeded depth {0}")]
    RecursionLimit(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl VersionError {
    pub(crate) fn not_found(kind: &'static str, key: impl ToString) -> Self {
        VersionError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// True for the tree-edit failures that a merge reports as a conflict.
    pub(crate) fn is_tree_clash(&self) -> bool {
        matches!(
            self,
            VersionError::EntryExists(_)
                | VersionError::BlobMustBeLeaf(_)
                | VersionError::PathNotFound(_)
                | VersionError::NotDirectory(_)
        )
    }
}

impl From<config::ConfigError> for VersionError {
    fn from(err: config::ConfigError) -> Self {
        VersionError::ConfigError(err.to_string())
    }
}
