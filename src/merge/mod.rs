//! Three-Way Merge Engine
//!
//! Both sides are diffed against the merge base, the two change lists are
//! walked in lock-step by path, and the merged list is replayed onto a work
//! tree seeded at the base tree. Criss-cross histories are first reduced to a
//! single virtual base by merging their lowest common ancestors recursively.

pub mod resolver;

pub use resolver::{
    ConflictResolver, LeftResolver, LowestHashResolver, PathSelectionResolver, RightResolver, Side,
    StrictResolver,
};

use crate::cancel::Cancellation;
use crate::diff::{diff_trees, Action, Change, Changes};
use crate::error::VersionError;
use crate::graph::{is_ancestor, merge_bases};
use crate::object::{Commit, TreeNode};
use crate::store::{ObjectRepo, Repo};
use crate::tree::{path, WorkTree};
use crate::types::{Hash, Operator};
use std::cmp::Ordering;
use std::iter::Peekable;
use std::slice;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Message prefix of the synthetic commits standing in for a criss-cross
/// merge base.
pub const VIRTUAL_MERGE_PREFIX: &str = "[virtual merge]";

pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 16;

/// Position of a path in the two change lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeItem<'c> {
    Left(&'c Change),
    Right(&'c Change),
    Both(&'c Change, &'c Change),
}

/// Lock-step walk over two path-sorted change lists.
pub struct MergeIter<'c> {
    left: Peekable<slice::Iter<'c, Change>>,
    right: Peekable<slice::Iter<'c, Change>>,
}

impl<'c> MergeIter<'c> {
    pub fn new(left: &'c Changes, right: &'c Changes) -> Self {
        Self {
            left: left.iter().peekable(),
            right: right.iter().peekable(),
        }
    }
}

impl<'c> Iterator for MergeIter<'c> {
    type Item = MergeItem<'c>;

    fn next(&mut self) -> Option<Self::Item> {
        let ord = match (self.left.peek(), self.right.peek()) {
            (None, None) => return None,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(l), Some(r)) => path::compare_paths(&l.path, &r.path),
        };
        match ord {
            Ordering::Less => self.left.next().map(MergeItem::Left),
            Ordering::Greater => self.right.next().map(MergeItem::Right),
            Ordering::Equal => match (self.left.next(), self.right.next()) {
                (Some(l), Some(r)) => Some(MergeItem::Both(l, r)),
                _ => None,
            },
        }
    }
}

/// Combine two change lists. One-sided changes pass through, identical
/// results are taken once, and real divergences go to the resolver.
pub fn merge_changes(
    left: &Changes,
    right: &Changes,
    resolver: &dyn ConflictResolver,
) -> Result<Vec<Change>, VersionError> {
    let mut merged = Vec::with_capacity(left.num() + right.num());
    for item in MergeIter::new(left, right) {
        let change = match item {
            MergeItem::Left(change) | MergeItem::Right(change) => change.clone(),
            MergeItem::Both(l, r) if l.to_hash() == r.to_hash() => l.clone(),
            MergeItem::Both(l, r) => {
                debug!(path = %l.path, left = %l.action, right = %r.action, "Resolving conflict");
                resolver.resolve(l, r)?
            }
        };
        merged.push(change);
    }
    Ok(merged)
}

/// Merge `ours` and `theirs` relative to `base`; returns the merged root.
///
/// Deletions are applied before insertions so a file may replace a
/// directory and the reverse. A merged change the tree cannot take (its
/// path clashes with the other side's edits) is a `Conflict`.
pub fn three_way_merge_trees(
    objects: &dyn ObjectRepo,
    repository_id: Uuid,
    base: &Hash,
    ours: &Hash,
    theirs: &Hash,
    resolver: &dyn ConflictResolver,
    cancel: &Cancellation,
) -> Result<Hash, VersionError> {
    let left = diff_trees(objects, repository_id, base, ours, cancel)?;
    let right = diff_trees(objects, repository_id, base, theirs, cancel)?;
    if right.is_empty() {
        return Ok(*ours);
    }
    if left.is_empty() {
        return Ok(*theirs);
    }

    let merged = merge_changes(&left, &right, resolver)?;
    let (deletes, writes): (Vec<Change>, Vec<Change>) =
        merged.into_iter().partition(|c| c.action == Action::Delete);

    let mut tree = WorkTree::new(objects, repository_id, *base);
    for change in deletes.iter().chain(writes.iter()) {
        cancel.check()?;
        tree.apply_one_change(change).map_err(|err| {
            if err.is_tree_clash() {
                VersionError::Conflict {
                    path: change.path.clone(),
                }
            } else {
                err
            }
        })?;
    }
    debug!(
        left = left.num(),
        right = right.num(),
        root = %tree.root().short(),
        "Merged trees"
    );
    Ok(tree.root())
}

/// Result of merging a commit into a branch head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The target is already contained in the head; nothing changes.
    UpToDate(Commit),
    /// The head is an ancestor of the target, which becomes the new head.
    FastForward(Commit),
    /// A new merge commit with both heads as parents.
    Merged(Commit),
}

impl MergeOutcome {
    pub fn commit(&self) -> &Commit {
        match self {
            MergeOutcome::UpToDate(c) | MergeOutcome::FastForward(c) | MergeOutcome::Merged(c) => c,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MergeOutcome::UpToDate(_) => "up-to-date",
            MergeOutcome::FastForward(_) => "fast-forward",
            MergeOutcome::Merged(_) => "merged",
        }
    }

    pub fn into_commit(self) -> Commit {
        match self {
            MergeOutcome::UpToDate(c) | MergeOutcome::FastForward(c) | MergeOutcome::Merged(c) => c,
        }
    }
}

/// Commit-level merge, including recursive virtual bases.
pub struct Merger<'a> {
    repo: &'a dyn Repo,
    repository_id: Uuid,
    resolver: &'a dyn ConflictResolver,
    cancel: Cancellation,
    max_depth: usize,
}

impl<'a> Merger<'a> {
    pub fn new(repo: &'a dyn Repo, repository_id: Uuid, resolver: &'a dyn ConflictResolver) -> Self {
        Self {
            repo,
            repository_id,
            resolver,
            cancel: Cancellation::new(),
            max_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn load_commit(&self, hash: &Hash) -> Result<Commit, VersionError> {
        self.repo
            .get_commit(self.repository_id, hash)?
            .ok_or_else(|| VersionError::not_found("commit", hash))
    }

    /// Merge `theirs` into `ours`.
    #[instrument(skip(self, ours, theirs, merger, message), fields(ours = %ours.short(), theirs = %theirs.short()))]
    pub fn merge(
        &self,
        ours: &Hash,
        theirs: &Hash,
        merger: &Operator,
        message: &str,
    ) -> Result<MergeOutcome, VersionError> {
        let commits = self.repo.commits();
        if is_ancestor(commits, self.repository_id, theirs, ours, &self.cancel)? {
            debug!("Target already contained in head");
            return Ok(MergeOutcome::UpToDate(self.load_commit(ours)?));
        }
        if is_ancestor(commits, self.repository_id, ours, theirs, &self.cancel)? {
            debug!("Fast-forward");
            return Ok(MergeOutcome::FastForward(self.load_commit(theirs)?));
        }

        let ours_commit = self.load_commit(ours)?;
        let theirs_commit = self.load_commit(theirs)?;
        let base_tree = self.base_tree(ours, theirs, 0)?;
        let tree = three_way_merge_trees(
            self.repo.objects(),
            self.repository_id,
            &base_tree,
            &ours_commit.tree_hash,
            &theirs_commit.tree_hash,
            self.resolver,
            &self.cancel,
        )?;

        let signature = merger.signature();
        let commit = Commit::new(
            self.repository_id,
            signature.clone(),
            signature,
            message,
            tree,
            vec![*ours, *theirs],
        );
        self.repo.insert_commit(&commit)?;
        info!(commit = %commit.hash.short(), tree = %tree.short(), "Created merge commit");
        Ok(MergeOutcome::Merged(commit))
    }

    /// Tree to use as the merge base of two commits.
    fn base_tree(&self, a: &Hash, b: &Hash, depth: usize) -> Result<Hash, VersionError> {
        if depth > self.max_depth {
            return Err(VersionError::RecursionLimit(self.max_depth));
        }
        self.cancel.check()?;

        let bases = merge_bases(self.repo.commits(), self.repository_id, a, b, &self.cancel)?;
        let mut iter = bases.into_iter();
        let Some(first) = iter.next() else {
            debug!("No common ancestor, merging against the empty tree");
            self.repo.insert_tree_node(&TreeNode::empty(self.repository_id))?;
            return Ok(TreeNode::empty_hash());
        };

        let mut acc = first;
        for next in iter {
            acc = self.virtual_commit(&acc, &next, depth + 1)?;
        }
        Ok(acc.tree_hash)
    }

    /// Merge two ancestors into a synthetic commit used only as a base.
    fn virtual_commit(&self, a: &Commit, b: &Commit, depth: usize) -> Result<Commit, VersionError> {
        let base_tree = self.base_tree(&a.hash, &b.hash, depth)?;
        let tree = three_way_merge_trees(
            self.repo.objects(),
            self.repository_id,
            &base_tree,
            &a.tree_hash,
            &b.tree_hash,
            self.resolver,
            &self.cancel,
        )?;
        let commit = Commit::new(
            self.repository_id,
            a.author.clone(),
            a.committer.clone(),
            format!("{} {} + {}", VIRTUAL_MERGE_PREFIX, a.hash.short(), b.hash.short()),
            tree,
            vec![a.hash, b.hash],
        );
        self.repo.insert_commit(&commit)?;
        debug!(commit = %commit.hash.short(), depth, "Created virtual merge base");
        Ok(commit)
    }
}
