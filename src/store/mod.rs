//! Object, commit, branch and wip stores
//!
//! The engine only talks to storage through the narrow traits below. Every
//! object lookup goes through a fingerprint key, so the same engine runs over
//! the in-memory backend, the sled backend, or any other key-value store.

pub mod kv;
pub mod memory;
pub mod persistence;

pub use kv::{KvBackend, KvStore, WriteBatch};
pub use memory::MemoryBackend;
pub use persistence::SledBackend;

use crate::error::{StorageError, VersionError};
use crate::object::{Blob, Branch, Commit, TreeNode, WorkingInProcess};
use crate::types::Hash;
use uuid::Uuid;

/// Content-addressed tree node and blob records. Inserts are idempotent.
pub trait ObjectRepo {
    fn insert_tree_node(&self, node: &TreeNode) -> Result<(), StorageError>;
    fn insert_blob(&self, blob: &Blob) -> Result<(), StorageError>;
    fn get_tree_node(&self, repository_id: Uuid, hash: &Hash) -> Result<Option<TreeNode>, StorageError>;
    fn get_blob(&self, repository_id: Uuid, hash: &Hash) -> Result<Option<Blob>, StorageError>;
}

pub trait CommitRepo {
    fn insert_commit(&self, commit: &Commit) -> Result<(), StorageError>;
    fn get_commit(&self, repository_id: Uuid, hash: &Hash) -> Result<Option<Commit>, StorageError>;
}

/// Branch records keyed by (repository, name).
pub trait BranchRepo {
    fn get_branch(&self, repository_id: Uuid, name: &str) -> Result<Option<Branch>, StorageError>;
    /// Fails with `AlreadyExists` if the name is taken.
    fn insert_branch(&self, branch: &Branch) -> Result<(), StorageError>;
    /// Fails with `NotFound` if the branch does not exist.
    fn update_branch_head(&self, repository_id: Uuid, name: &str, head: Option<Hash>) -> Result<Branch, StorageError>;
    fn delete_branch(&self, repository_id: Uuid, name: &str) -> Result<(), StorageError>;
    fn list_branches(&self, repository_id: Uuid) -> Result<Vec<Branch>, StorageError>;
}

/// Wip records keyed by (repository, branch, creator).
pub trait WipRepo {
    fn get_wip(&self, repository_id: Uuid, branch_id: Uuid, creator: &str) -> Result<Option<WorkingInProcess>, StorageError>;
    /// Fails with `AlreadyExists` if the (branch, creator) pair already has a wip.
    fn insert_wip(&self, wip: &WorkingInProcess) -> Result<(), StorageError>;
    fn update_wip(&self, wip: &WorkingInProcess) -> Result<(), StorageError>;
    fn delete_wip(&self, repository_id: Uuid, branch_id: Uuid, creator: &str) -> Result<(), StorageError>;
    /// Removes every wip anchored to a branch; returns how many were removed.
    fn delete_wips_for_branch(&self, repository_id: Uuid, branch_id: Uuid) -> Result<usize, StorageError>;
    fn list_wips(&self, repository_id: Uuid, branch_id: Uuid) -> Result<Vec<WorkingInProcess>, StorageError>;
}

/// Callback executed inside a transaction.
pub type TxnFn<'f> = dyn FnMut(&dyn Repo) -> Result<(), VersionError> + 'f;

/// All stores plus a transaction boundary.
pub trait Repo: ObjectRepo + CommitRepo + BranchRepo + WipRepo {
    fn objects(&self) -> &dyn ObjectRepo;

    fn commits(&self) -> &dyn CommitRepo;

    /// Run `f` so that either all of its writes become visible or none do.
    ///
    /// Writes made through the `&dyn Repo` handed to `f` are discarded when
    /// `f` returns an error. Calling this on a transactional view joins the
    /// enclosing transaction.
    fn run_in_transaction(&self, f: &mut TxnFn<'_>) -> Result<(), VersionError>;
}
