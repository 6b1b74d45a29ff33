//! Versa: Content-Addressed Version Control
//!
//! A Git-like version-control engine over a pluggable store. Blobs, trees and
//! commits are immutable and identified by their fingerprint; branches and
//! per-user wips are the mutable pointers into that graph. On top of the
//! object model sit copy-on-write tree edits, a merkle diff, commit-graph
//! traversals, merge-base resolution and a three-way merge with recursive
//! virtual bases.

pub mod block;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod graph;
pub mod logging;
pub mod merge;
pub mod object;
pub mod repo;
pub mod store;
pub mod tree;
pub mod types;

pub use cancel::Cancellation;
pub use diff::{diff_trees, Action, Change, Changes};
pub use error::{StorageError, VersionError};
pub use merge::{ConflictResolver, MergeOutcome, Merger};
pub use object::{Blob, Branch, Commit, TreeEntry, TreeNode, WorkingInProcess};
pub use repo::{CheckoutMode, RepoState, WorkRepository};
pub use store::{KvStore, Repo};
pub use tree::WorkTree;
pub use types::{Hash, Operator, Properties, Signature};
