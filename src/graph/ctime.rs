//! Committer-time ordered commit walk

use super::{CommitIter, CommitNode, Seen};
use crate::cancel::Cancellation;
use crate::error::VersionError;
use crate::types::Hash;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Queued<'a>(CommitNode<'a>);

impl Queued<'_> {
    fn key(&self) -> (chrono::DateTime<chrono::Utc>, Hash) {
        (self.0.committer_time(), self.0.hash())
    }
}

impl PartialEq for Queued<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Queued<'_> {}

impl PartialOrd for Queued<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Newest committer timestamp first; ties broken by fingerprint so the order
/// is fully deterministic. This is the order `log` uses.
pub struct CtimeIter<'a> {
    heap: BinaryHeap<Queued<'a>>,
    seen: Seen,
}

impl<'a> CtimeIter<'a> {
    pub fn new(start: CommitNode<'a>, ignore: &[Hash]) -> Self {
        Self::from_many(vec![start], ignore)
    }

    /// Walk from several tips at once, interleaving by time.
    pub fn from_many(starts: Vec<CommitNode<'a>>, ignore: &[Hash]) -> Self {
        let mut seen = Seen::new(ignore);
        let mut heap = BinaryHeap::new();
        for start in starts {
            if seen.insert(start.hash()) {
                heap.push(Queued(start));
            }
        }
        Self { heap, seen }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.seen.set_cancellation(cancel);
        self
    }
}

impl<'a> CommitIter<'a> for CtimeIter<'a> {
    fn next_commit(&mut self) -> Result<Option<CommitNode<'a>>, VersionError> {
        self.seen.check()?;
        let Some(Queued(node)) = self.heap.pop() else {
            return Ok(None);
        };
        for parent in node.unseen_parents(&mut self.seen)? {
            self.heap.push(Queued(parent));
        }
        Ok(Some(node))
    }
}
