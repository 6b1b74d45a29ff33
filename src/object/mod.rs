//! Content-Addressed Object Model
//!
//! Blobs, tree nodes and commits are immutable and identified by their
//! fingerprint. Branches and wips are the only mutable records; they point
//! into the object graph by fingerprint.

pub mod hasher;

use crate::error::VersionError;
use crate::types::{Hash, Properties, Signature};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

/// Leaf object describing one stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub hash: Hash,
    pub repository_id: Uuid,
    /// Checksum of the raw bytes; locates them in the block adapter.
    pub check_sum: Hash,
    pub size: u64,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blob {
    pub fn new(repository_id: Uuid, check_sum: Hash, size: u64, properties: Properties) -> Self {
        let now = Utc::now();
        Self {
            hash: hasher::compute_blob_hash(&check_sum, &properties),
            repository_id,
            check_sum,
            size,
            properties,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A named edge from a tree node to a child blob or tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub is_dir: bool,
    pub hash: Hash,
}

impl TreeEntry {
    pub fn leaf(name: impl Into<String>, hash: Hash) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            hash,
        }
    }

    pub fn dir(name: impl Into<String>, hash: Hash) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            hash,
        }
    }
}

/// Directory object. Entries are always sorted by name and unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub hash: Hash,
    pub repository_id: Uuid,
    entries: Vec<TreeEntry>,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TreeNode {
    /// Build a tree node from entries in any order.
    ///
    /// Entries are sorted by name before hashing; duplicate names or names
    /// containing a path separator are rejected.
    pub fn new(repository_id: Uuid, mut entries: Vec<TreeEntry>) -> Result<Self, VersionError> {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in entries.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(VersionError::EntryExists(pair[0].name.clone()));
            }
        }
        if let Some(bad) = entries
            .iter()
            .find(|e| e.name.is_empty() || e.name.contains('/'))
        {
            return Err(VersionError::PathNotFound(bad.name.clone()));
        }
        Ok(Self::from_sorted(repository_id, entries))
    }

    fn from_sorted(repository_id: Uuid, entries: Vec<TreeEntry>) -> Self {
        let properties = Properties::directory();
        let now = Utc::now();
        Self {
            hash: hasher::compute_tree_hash(&entries, &properties),
            repository_id,
            entries,
            properties,
            created_at: now,
            updated_at: now,
        }
    }

    /// The canonical zero-entry tree. Unborn branches and fully emptied trees
    /// both resolve to it.
    pub fn empty(repository_id: Uuid) -> Self {
        Self::from_sorted(repository_id, Vec::new())
    }

    /// Fingerprint of [`TreeNode::empty`]; identical for every repository.
    pub fn empty_hash() -> Hash {
        static EMPTY: OnceLock<Hash> = OnceLock::new();
        *EMPTY.get_or_init(|| hasher::compute_tree_hash(&[], &Properties::directory()))
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// New node with `entry` inserted, or replacing the entry of the same name.
    pub fn with_entry(&self, entry: TreeEntry) -> Self {
        let mut entries = self.entries.clone();
        match entries.binary_search_by(|e| e.name.cmp(&entry.name)) {
            Ok(idx) => entries[idx] = entry,
            Err(idx) => entries.insert(idx, entry),
        }
        Self::from_sorted(self.repository_id, entries)
    }

    /// New node without the entry called `name`. Unchanged copy if absent.
    pub fn without_entry(&self, name: &str) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|e| e.name != name)
            .cloned()
            .collect();
        Self::from_sorted(self.repository_id, entries)
    }

    /// Recompute the fingerprint and compare with the stored one.
    pub fn verify(&self) -> bool {
        let sorted = self.entries.windows(2).all(|w| w[0].name < w[1].name);
        sorted && hasher::compute_tree_hash(&self.entries, &self.properties) == self.hash
    }
}

/// Immutable snapshot of a tree plus its ancestry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: Hash,
    pub repository_id: Uuid,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
    pub tree_hash: Hash,
    pub parent_hashes: Vec<Hash>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Commit {
    pub fn new(
        repository_id: Uuid,
        author: Signature,
        committer: Signature,
        message: impl Into<String>,
        tree_hash: Hash,
        parent_hashes: Vec<Hash>,
    ) -> Self {
        let message = message.into();
        let now = Utc::now();
        Self {
            hash: hasher::compute_commit_hash(
                &author,
                &committer,
                &message,
                &tree_hash,
                &parent_hashes,
            ),
            repository_id,
            author,
            committer,
            message,
            tree_hash,
            parent_hashes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_hashes.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parent_hashes.len() >= 2
    }
}

/// Mutable pointer to a head commit. `head` is `None` for an unborn branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub name: String,
    pub head: Option<Hash>,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Branch {
    pub fn new(repository_id: Uuid, name: impl Into<String>, head: Option<Hash>, creator: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            repository_id,
            name: name.into(),
            head,
            creator: creator.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WipState {
    Init,
    Completed,
}

/// A user's staging area on one branch. At most one per (creator, branch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingInProcess {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub branch_id: Uuid,
    pub creator: String,
    /// Branch head this wip was started from; must still be the head at commit.
    pub base_commit: Option<Hash>,
    pub current_tree: Hash,
    pub state: WipState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkingInProcess {
    pub fn new(branch: &Branch, creator: impl Into<String>, current_tree: Hash) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            repository_id: branch.repository_id,
            branch_id: branch.id,
            creator: creator.into(),
            base_commit: branch.head,
            current_tree,
            state: WipState::Init,
            created_at: now,
            updated_at: now,
        }
    }
}
