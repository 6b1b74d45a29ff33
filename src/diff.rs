//! Merkle Diff Engine
//!
//! Walks two tree snapshots in parallel by entry name. Subtrees with equal
//! fingerprints are skipped without being loaded, so the cost is
//! proportional to what changed rather than to the size of the trees.

use crate::cancel::Cancellation;
use crate::error::VersionError;
use crate::object::TreeEntry;
use crate::store::ObjectRepo;
use crate::tree::work_tree::collect_leaves;
use crate::tree::{load_tree, path};
use crate::types::Hash;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{ControlFlow, Index};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Insert,
    Delete,
    Modify,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Insert => "insert",
            Action::Delete => "delete",
            Action::Modify => "modify",
        };
        f.pad(s)
    }
}

/// One side of a change: the entry name and the fingerprint it pointed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub name: String,
    pub hash: Hash,
}

impl From<&TreeEntry> for ChangeEntry {
    fn from(entry: &TreeEntry) -> Self {
        Self {
            name: entry.name.clone(),
            hash: entry.hash,
        }
    }
}

/// A leaf-level difference between two trees. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub action: Action,
    pub from: Option<ChangeEntry>,
    pub to: Option<ChangeEntry>,
}

impl Change {
    pub fn insert(path: impl Into<String>, to: ChangeEntry) -> Self {
        Self {
            path: path.into(),
            action: Action::Insert,
            from: None,
            to: Some(to),
        }
    }

    pub fn delete(path: impl Into<String>, from: ChangeEntry) -> Self {
        Self {
            path: path.into(),
            action: Action::Delete,
            from: Some(from),
            to: None,
        }
    }

    pub fn modify(path: impl Into<String>, from: ChangeEntry, to: ChangeEntry) -> Self {
        Self {
            path: path.into(),
            action: Action::Modify,
            from: Some(from),
            to: Some(to),
        }
    }

    /// Fingerprint the path ends up with; `None` when the change deletes it.
    pub fn to_hash(&self) -> Option<Hash> {
        self.to.as_ref().map(|e| e.hash)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6} {}", self.action, self.path)
    }
}

/// Changes sorted by path, with a restartable cursor.
#[derive(Debug, Clone, Default)]
pub struct Changes {
    items: Vec<Change>,
    cursor: usize,
}

impl Changes {
    pub fn new(mut items: Vec<Change>) -> Self {
        items.sort_by(|a, b| path::compare_paths(&a.path, &b.path));
        Self { items, cursor: 0 }
    }

    pub fn num(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Change> {
        self.items.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Change> {
        self.items
    }

    /// The change under the cursor, advancing it. `None` once exhausted.
    pub fn next_change(&mut self) -> Option<&Change> {
        let item = self.items.get(self.cursor)?;
        self.cursor += 1;
        Some(item)
    }

    /// Step the cursor back so the previous change is yielded again.
    pub fn back(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Visit changes in order until the callback breaks or fails.
    ///
    /// A `ControlFlow::Break` ends the walk with `Ok`; only errors from the
    /// callback are propagated.
    pub fn for_each<F>(&self, mut f: F) -> Result<(), VersionError>
    where
        F: FnMut(&Change) -> Result<ControlFlow<()>, VersionError>,
    {
        for change in &self.items {
            if f(change)?.is_break() {
                break;
            }
        }
        Ok(())
    }
}

impl Index<usize> for Changes {
    type Output = Change;

    fn index(&self, idx: usize) -> &Change {
        &self.items[idx]
    }
}

impl<'a> IntoIterator for &'a Changes {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

struct Differ<'a> {
    objects: &'a dyn ObjectRepo,
    repository_id: Uuid,
    cancel: &'a Cancellation,
    out: Vec<Change>,
}

impl Differ<'_> {
    fn diff_nodes(&mut self, prefix: &str, from: &Hash, to: &Hash) -> Result<(), VersionError> {
        self.cancel.check()?;
        let from_node = load_tree(self.objects, self.repository_id, from)?;
        let to_node = load_tree(self.objects, self.repository_id, to)?;
        let (left, right) = (from_node.entries(), to_node.entries());

        let (mut i, mut j) = (0, 0);
        loop {
            let ord = match (left.get(i), right.get(j)) {
                (Some(a), Some(b)) => a.name.cmp(&b.name),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => break,
            };
            match ord {
                Ordering::Less => {
                    self.removed(prefix, &left[i])?;
                    i += 1;
                }
                Ordering::Greater => {
                    self.added(prefix, &right[j])?;
                    j += 1;
                }
                Ordering::Equal => {
                    self.compare(prefix, &left[i], &right[j])?;
                    i += 1;
                    j += 1;
                }
            }
        }
        Ok(())
    }

    fn compare(&mut self, prefix: &str, a: &TreeEntry, b: &TreeEntry) -> Result<(), VersionError> {
        if a.hash == b.hash && a.is_dir == b.is_dir {
            return Ok(());
        }
        let full = path::join_path(prefix, &a.name);
        match (a.is_dir, b.is_dir) {
            (true, true) => self.diff_nodes(&full, &a.hash, &b.hash),
            (false, false) => {
                self.out.push(Change::modify(full, a.into(), b.into()));
                Ok(())
            }
            // File replaced by directory or the reverse.
            _ => {
                self.removed(prefix, a)?;
                self.added(prefix, b)
            }
        }
    }

    fn removed(&mut self, prefix: &str, entry: &TreeEntry) -> Result<(), VersionError> {
        for (path, leaf) in self.expand(prefix, entry)? {
            self.out.push(Change::delete(path, (&leaf).into()));
        }
        Ok(())
    }

    fn added(&mut self, prefix: &str, entry: &TreeEntry) -> Result<(), VersionError> {
        for (path, leaf) in self.expand(prefix, entry)? {
            self.out.push(Change::insert(path, (&leaf).into()));
        }
        Ok(())
    }

    fn expand(&self, prefix: &str, entry: &TreeEntry) -> Result<Vec<(String, TreeEntry)>, VersionError> {
        let full = path::join_path(prefix, &entry.name);
        if !entry.is_dir {
            return Ok(vec![(full, entry.clone())]);
        }
        self.cancel.check()?;
        let mut leaves = Vec::new();
        collect_leaves(self.objects, self.repository_id, &entry.hash, &full, &mut leaves)?;
        Ok(leaves)
    }
}

/// Compute the leaf-level changes that turn tree `from` into tree `to`.
pub fn diff_trees(
    objects: &dyn ObjectRepo,
    repository_id: Uuid,
    from: &Hash,
    to: &Hash,
    cancel: &Cancellation,
) -> Result<Changes, VersionError> {
    if from == to {
        return Ok(Changes::default());
    }
    let mut differ = Differ {
        objects,
        repository_id,
        cancel,
        out: Vec::new(),
    };
    differ.diff_nodes("", from, to)?;
    Ok(Changes::new(differ.out))
}
