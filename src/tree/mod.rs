//! Tree Mutation Engine
//!
//! Path-based edits over an immutable, content-addressed directory tree.
//! Every edit writes new tree nodes for the changed path and yields a new
//! root; nodes reachable from older roots are never touched.

pub mod path;
pub mod work_tree;

pub use work_tree::WorkTree;

use crate::error::VersionError;
use crate::object::TreeNode;
use crate::store::ObjectRepo;
use crate::types::Hash;
use uuid::Uuid;

/// Fetch a tree node, treating the canonical empty root as always present.
pub fn load_tree(objects: &dyn ObjectRepo, repository_id: Uuid, hash: &Hash) -> Result<TreeNode, VersionError> {
    match objects.get_tree_node(repository_id, hash)? {
        Some(node) => Ok(node),
        None if *hash == TreeNode::empty_hash() => Ok(TreeNode::empty(repository_id)),
        None => Err(VersionError::not_found("tree", hash)),
    }
}
