//! Copy-on-write edits over one tree root

use crate::diff::{Action, Change};
use crate::error::VersionError;
use crate::object::{Blob, TreeEntry, TreeNode};
use crate::store::ObjectRepo;
use crate::tree::{load_tree, path};
use crate::types::Hash;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Result of resolving a path segment by segment.
#[derive(Debug)]
struct PathMatch {
    /// Directory nodes from the root down to the deepest resolved directory.
    /// `dirs[k]` for `k >= 1` is the node behind `entries[k - 1]`.
    dirs: Vec<TreeNode>,
    /// The entry matched for each resolved segment.
    entries: Vec<TreeEntry>,
    /// Segments left unresolved; empty when the whole path resolved.
    missing: Vec<String>,
}

impl PathMatch {
    fn found(&self) -> bool {
        self.missing.is_empty()
    }

    /// The entry the full path resolved to. `None` for the root.
    fn terminal(&self) -> Option<&TreeEntry> {
        if self.found() {
            self.entries.last()
        } else {
            None
        }
    }

    /// Resolution stopped because a segment named a file, not a directory.
    fn blocked_by_leaf(&self) -> bool {
        !self.missing.is_empty() && self.entries.last().is_some_and(|e| !e.is_dir)
    }

    fn deepest_dir(&self) -> usize {
        self.dirs.len() - 1
    }
}

/// An editable view of one tree root.
///
/// All edits insert new tree nodes through the object store and move
/// [`root`](Self::root) forward; the previous root stays valid.
pub struct WorkTree<'a> {
    objects: &'a dyn ObjectRepo,
    repository_id: Uuid,
    root: Hash,
}

impl<'a> WorkTree<'a> {
    pub fn new(objects: &'a dyn ObjectRepo, repository_id: Uuid, root: Hash) -> Self {
        Self {
            objects,
            repository_id,
            root,
        }
    }

    /// Work tree starting from the canonical empty root.
    pub fn empty(objects: &'a dyn ObjectRepo, repository_id: Uuid) -> Self {
        Self::new(objects, repository_id, TreeNode::empty_hash())
    }

    pub fn root(&self) -> Hash {
        self.root
    }

    pub fn repository_id(&self) -> Uuid {
        self.repository_id
    }

    fn match_path(&self, segments: &[String]) -> Result<PathMatch, VersionError> {
        let mut dirs = vec![load_tree(self.objects, self.repository_id, &self.root)?];
        let mut entries: Vec<TreeEntry> = Vec::new();

        for (idx, segment) in segments.iter().enumerate() {
            let current = &dirs[dirs.len() - 1];
            let Some(entry) = current.entry(segment).cloned() else {
                return Ok(PathMatch {
                    dirs,
                    entries,
                    missing: segments[idx..].to_vec(),
                });
            };

            if entry.is_dir {
                let node = load_tree(self.objects, self.repository_id, &entry.hash)?;
                entries.push(entry);
                dirs.push(node);
            } else {
                entries.push(entry);
                return Ok(PathMatch {
                    dirs,
                    entries,
                    missing: segments[idx + 1..].to_vec(),
                });
            }
        }

        Ok(PathMatch {
            dirs,
            entries,
            missing: Vec::new(),
        })
    }

    /// Put `replacement` into `dirs[depth]` and rewrite every ancestor up to
    /// the root with the new child fingerprint.
    fn rewrite_from(&mut self, m: &PathMatch, depth: usize, replacement: TreeEntry) -> Result<Hash, VersionError> {
        let mut child = replacement;
        let mut level = depth;
        loop {
            let node = m.dirs[level].with_entry(child);
            self.objects.insert_tree_node(&node)?;
            if level == 0 {
                self.root = node.hash;
                return Ok(self.root);
            }
            child = TreeEntry::dir(m.entries[level - 1].name.clone(), node.hash);
            level -= 1;
        }
    }

    fn segments(path: &str) -> Result<Vec<String>, VersionError> {
        let segments = path::split_path(path);
        if segments.is_empty() {
            return Err(VersionError::PathNotFound(path.to_string()));
        }
        Ok(segments)
    }

    /// Insert a blob at a path that does not exist yet, creating any missing
    /// directories. Returns the new root.
    #[instrument(skip(self, blob), fields(blob = %blob.hash.short()))]
    pub fn add_leaf(&mut self, path: &str, blob: &Blob) -> Result<Hash, VersionError> {
        let segments = Self::segments(path)?;
        let m = self.match_path(&segments)?;
        if m.found() {
            return Err(VersionError::EntryExists(path::normalize_path(path)));
        }
        if m.blocked_by_leaf() {
            return Err(VersionError::BlobMustBeLeaf(path::normalize_path(path)));
        }

        self.objects.insert_blob(blob)?;

        // Synthesize the missing directories bottom-up.
        let (leaf_name, new_dirs) = m
            .missing
            .split_last()
            .ok_or_else(|| VersionError::PathNotFound(path.to_string()))?;
        let mut child = TreeEntry::leaf(leaf_name.clone(), blob.hash);
        for name in new_dirs.iter().rev() {
            let node = TreeNode::new(self.repository_id, vec![child])?;
            self.objects.insert_tree_node(&node)?;
            child = TreeEntry::dir(name.clone(), node.hash);
        }

        let root = self.rewrite_from(&m, m.deepest_dir(), child)?;
        debug!(root = %root.short(), created_dirs = new_dirs.len(), "Added leaf");
        Ok(root)
    }

    /// Swap the blob at an existing file path. Returns the new root.
    #[instrument(skip(self, blob), fields(blob = %blob.hash.short()))]
    pub fn replace_leaf(&mut self, path: &str, blob: &Blob) -> Result<Hash, VersionError> {
        let segments = Self::segments(path)?;
        let m = self.match_path(&segments)?;
        let Some(entry) = m.terminal() else {
            return Err(VersionError::PathNotFound(path::normalize_path(path)));
        };
        if entry.is_dir {
            return Err(VersionError::PathNotFound(path::normalize_path(path)));
        }

        self.objects.insert_blob(blob)?;
        let leaf = TreeEntry::leaf(entry.name.clone(), blob.hash);
        let root = self.rewrite_from(&m, m.deepest_dir(), leaf)?;
        debug!(root = %root.short(), "Replaced leaf");
        Ok(root)
    }

    /// Remove the file or subtree at `path`.
    ///
    /// A directory left without entries is removed from its own parent,
    /// repeatedly up the path; an emptied tree becomes the canonical empty
    /// root.
    #[instrument(skip(self))]
    pub fn remove_entry(&mut self, path: &str) -> Result<Hash, VersionError> {
        let segments = Self::segments(path)?;
        let m = self.match_path(&segments)?;
        if !m.found() {
            return Err(VersionError::PathNotFound(path::normalize_path(path)));
        }

        let mut level = m.entries.len() - 1;
        let mut name = m.entries[level].name.clone();
        let mut collapsed = 0usize;
        loop {
            let node = m.dirs[level].without_entry(&name);
            if node.is_empty() && level > 0 {
                name = m.entries[level - 1].name.clone();
                level -= 1;
                collapsed += 1;
                continue;
            }

            self.objects.insert_tree_node(&node)?;
            let root = if level == 0 {
                self.root = node.hash;
                self.root
            } else {
                let entry = TreeEntry::dir(m.entries[level - 1].name.clone(), node.hash);
                self.rewrite_from(&m, level - 1, entry)?
            };
            debug!(root = %root.short(), collapsed, "Removed entry");
            return Ok(root);
        }
    }

    /// Entries of the directory at `path`; `""` lists the root.
    pub fn ls(&self, path: &str) -> Result<Vec<TreeEntry>, VersionError> {
        let segments = path::split_path(path);
        let m = self.match_path(&segments)?;
        if !m.found() {
            return Err(VersionError::PathNotFound(path::normalize_path(path)));
        }
        if m.terminal().is_some_and(|e| !e.is_dir) {
            return Err(VersionError::NotDirectory(path::normalize_path(path)));
        }
        Ok(m.dirs[m.deepest_dir()].entries().to_vec())
    }

    /// The entry at `path`, file or directory.
    pub fn find_entry(&self, path: &str) -> Result<TreeEntry, VersionError> {
        let segments = Self::segments(path)?;
        let m = self.match_path(&segments)?;
        m.terminal()
            .cloned()
            .ok_or_else(|| VersionError::PathNotFound(path::normalize_path(path)))
    }

    /// The blob stored at a file path. Directories are not found.
    pub fn find_blob(&self, path: &str) -> Result<Blob, VersionError> {
        let entry = self.find_entry(path)?;
        if entry.is_dir {
            return Err(VersionError::PathNotFound(path::normalize_path(path)));
        }
        self.load_blob(&entry.hash)
    }

    fn load_blob(&self, hash: &Hash) -> Result<Blob, VersionError> {
        self.objects
            .get_blob(self.repository_id, hash)?
            .ok_or_else(|| VersionError::not_found("blob", hash))
    }

    /// Every file under `prefix` as `(path, entry)`, in path order.
    pub fn walk_leaves(&self, prefix: &str) -> Result<Vec<(String, TreeEntry)>, VersionError> {
        let prefix = path::normalize_path(prefix);
        let mut out = Vec::new();
        if prefix.is_empty() {
            collect_leaves(self.objects, self.repository_id, &self.root, "", &mut out)?;
            return Ok(out);
        }

        let entry = self.find_entry(&prefix)?;
        if entry.is_dir {
            collect_leaves(self.objects, self.repository_id, &entry.hash, &prefix, &mut out)?;
        } else {
            out.push((prefix, entry));
        }
        Ok(out)
    }

    /// Apply one diff change: Insert adds, Delete removes, Modify replaces
    /// with the blob named by the change's `to` side.
    pub fn apply_one_change(&mut self, change: &Change) -> Result<Hash, VersionError> {
        match change.action {
            Action::Insert => {
                let blob = self.target_blob(change)?;
                self.add_leaf(&change.path, &blob)
            }
            Action::Delete => self.remove_entry(&change.path),
            Action::Modify => {
                let blob = self.target_blob(change)?;
                self.replace_leaf(&change.path, &blob)
            }
        }
    }

    fn target_blob(&self, change: &Change) -> Result<Blob, VersionError> {
        let to = change
            .to
            .as_ref()
            .ok_or_else(|| VersionError::not_found("change target", &change.path))?;
        self.load_blob(&to.hash)
    }
}

/// Depth-first, name-ordered collection of every leaf below `root`.
pub(crate) fn collect_leaves(
    objects: &dyn ObjectRepo,
    repository_id: Uuid,
    root: &Hash,
    prefix: &str,
    out: &mut Vec<(String, TreeEntry)>,
) -> Result<(), VersionError> {
    let node = load_tree(objects, repository_id, root)?;
    for entry in node.entries() {
        let full = path::join_path(prefix, &entry.name);
        if entry.is_dir {
            collect_leaves(objects, repository_id, &entry.hash, &full, out)?;
        } else {
            out.push((full, entry.clone()));
        }
    }
    Ok(())
}
