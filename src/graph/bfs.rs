//! Breadth-first commit walk

use super::{CommitIter, CommitNode, Seen};
use crate::cancel::Cancellation;
use crate::error::VersionError;
use crate::types::Hash;
use std::collections::VecDeque;

/// Visits the start commit, then its parents, then their parents, and so on.
pub struct BfsIter<'a> {
    queue: VecDeque<CommitNode<'a>>,
    seen: Seen,
}

impl<'a> BfsIter<'a> {
    pub fn new(start: CommitNode<'a>, ignore: &[Hash]) -> Self {
        let mut seen = Seen::new(ignore);
        let mut queue = VecDeque::new();
        if seen.insert(start.hash()) {
            queue.push_back(start);
        }
        Self { queue, seen }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.seen.set_cancellation(cancel);
        self
    }
}

impl<'a> CommitIter<'a> for BfsIter<'a> {
    fn next_commit(&mut self) -> Result<Option<CommitNode<'a>>, VersionError> {
        self.seen.check()?;
        let Some(node) = self.queue.pop_front() else {
            return Ok(None);
        };
        self.queue.extend(node.unseen_parents(&mut self.seen)?);
        Ok(Some(node))
    }
}
