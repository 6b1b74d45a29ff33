//! Commit Graph & Traversal
//!
//! Commits are wrapped in [`CommitNode`], which resolves parents lazily
//! through a [`CommitRepo`]. Every traversal strategy implements
//! [`CommitIter`]: produce the next commit or `None`, visit each reachable
//! commit once, and let a visitor stop early with `ControlFlow::Break`.
//!
//! Strategies:
//! - [`BfsIter`]: nearest ancestors first
//! - [`PreorderIter`]: depth-first, node before parents
//! - [`PostorderIter`]: depth-first, parents before node
//! - [`CtimeIter`]: newest committer timestamp first
//! - [`FilteredBfsIter`]: BFS with a validity and an expansion-limit predicate

pub mod bfs;
pub mod ctime;
pub mod dfs;
pub mod filter;
pub mod merge_base;

pub use bfs::BfsIter;
pub use ctime::CtimeIter;
pub use dfs::{PostorderIter, PreorderIter};
pub use filter::FilteredBfsIter;
pub use merge_base::{is_ancestor, merge_bases};

use crate::cancel::Cancellation;
use crate::error::VersionError;
use crate::object::Commit;
use crate::store::CommitRepo;
use crate::types::Hash;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::ops::ControlFlow;
use uuid::Uuid;

/// A commit plus the handle needed to resolve its parents.
#[derive(Clone)]
pub struct CommitNode<'a> {
    commits: &'a dyn CommitRepo,
    commit: Commit,
}

impl<'a> CommitNode<'a> {
    pub fn new(commits: &'a dyn CommitRepo, commit: Commit) -> Self {
        Self { commits, commit }
    }

    pub fn load(commits: &'a dyn CommitRepo, repository_id: Uuid, hash: &Hash) -> Result<Self, VersionError> {
        let commit = commits
            .get_commit(repository_id, hash)?
            .ok_or_else(|| VersionError::not_found("commit", hash))?;
        Ok(Self::new(commits, commit))
    }

    pub fn hash(&self) -> Hash {
        self.commit.hash
    }

    pub fn tree_hash(&self) -> Hash {
        self.commit.tree_hash
    }

    pub fn committer_time(&self) -> DateTime<Utc> {
        self.commit.committer.when
    }

    pub fn commit(&self) -> &Commit {
        &self.commit
    }

    pub fn into_commit(self) -> Commit {
        self.commit
    }

    pub fn parent_hashes(&self) -> &[Hash] {
        &self.commit.parent_hashes
    }

    /// Load the parents not yet in `seen`, marking them as seen.
    pub(crate) fn unseen_parents(&self, seen: &mut Seen) -> Result<Vec<CommitNode<'a>>, VersionError> {
        let mut out = Vec::new();
        for hash in &self.commit.parent_hashes {
            if seen.insert(*hash) {
                out.push(self.load_related(hash)?);
            }
        }
        Ok(out)
    }

    pub(crate) fn load_related(&self, hash: &Hash) -> Result<CommitNode<'a>, VersionError> {
        CommitNode::load(self.commits, self.commit.repository_id, hash)
    }

    /// Direct parents, in recorded order.
    pub fn parents(&self) -> Result<Vec<CommitNode<'a>>, VersionError> {
        self.commit
            .parent_hashes
            .iter()
            .map(|hash| CommitNode::load(self.commits, self.commit.repository_id, hash))
            .collect()
    }
}

impl std::fmt::Debug for CommitNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitNode")
            .field("hash", &self.commit.hash)
            .field("parents", &self.commit.parent_hashes)
            .finish()
    }
}

/// Common capability of every traversal strategy.
pub trait CommitIter<'a> {
    /// The next unvisited commit, or `None` once the walk is exhausted.
    fn next_commit(&mut self) -> Result<Option<CommitNode<'a>>, VersionError>;

    /// Feed commits to `visit` until the walk ends or the visitor breaks.
    ///
    /// Breaking is not an error: the call returns `Ok(())`.
    fn for_each<F>(&mut self, mut visit: F) -> Result<(), VersionError>
    where
        Self: Sized,
        F: FnMut(&CommitNode<'a>) -> Result<ControlFlow<()>, VersionError>,
    {
        while let Some(node) = self.next_commit()? {
            if visit(&node)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Drain the walk into a list of fingerprints.
    fn hashes(&mut self) -> Result<Vec<Hash>, VersionError>
    where
        Self: Sized,
    {
        let mut out = Vec::new();
        while let Some(node) = self.next_commit()? {
            out.push(node.hash());
        }
        Ok(out)
    }
}

/// Visit-once bookkeeping shared by the strategies.
#[derive(Debug, Default)]
pub(crate) struct Seen {
    hashes: HashSet<Hash>,
    cancel: Cancellation,
}

impl Seen {
    /// Ignored fingerprints count as already visited, so they are pruned
    /// together with everything only reachable through them.
    pub(crate) fn new(ignore: &[Hash]) -> Self {
        Self {
            hashes: ignore.iter().copied().collect(),
            cancel: Cancellation::new(),
        }
    }

    pub(crate) fn set_cancellation(&mut self, cancel: Cancellation) {
        self.cancel = cancel;
    }

    /// Mark as visited; false if it already was.
    pub(crate) fn insert(&mut self, hash: Hash) -> bool {
        self.hashes.insert(hash)
    }

    pub(crate) fn contains(&self, hash: &Hash) -> bool {
        self.hashes.contains(hash)
    }

    pub(crate) fn check(&self) -> Result<(), VersionError> {
        self.cancel.check()
    }
}
