//! Breadth-first walk with validity and expansion-limit predicates

use super::{CommitIter, CommitNode, Seen};
use crate::cancel::Cancellation;
use crate::error::VersionError;
use crate::types::Hash;
use std::collections::VecDeque;

/// BFS that only yields commits accepted by `is_valid` and does not expand
/// past commits matching `is_limit`. Used to bound ancestor searches.
pub struct FilteredBfsIter<'a, V, L> {
    queue: VecDeque<CommitNode<'a>>,
    seen: Seen,
    is_valid: V,
    is_limit: L,
}

impl<'a, V, L> FilteredBfsIter<'a, V, L>
where
    V: FnMut(&CommitNode<'a>) -> bool,
    L: FnMut(&CommitNode<'a>) -> bool,
{
    pub fn new(start: CommitNode<'a>, ignore: &[Hash], is_valid: V, is_limit: L) -> Self {
        let mut seen = Seen::new(ignore);
        let mut queue = VecDeque::new();
        if seen.insert(start.hash()) {
            queue.push_back(start);
        }
        Self {
            queue,
            seen,
            is_valid,
            is_limit,
        }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.seen.set_cancellation(cancel);
        self
    }
}

impl<'a, V, L> CommitIter<'a> for FilteredBfsIter<'a, V, L>
where
    V: FnMut(&CommitNode<'a>) -> bool,
    L: FnMut(&CommitNode<'a>) -> bool,
{
    fn next_commit(&mut self) -> Result<Option<CommitNode<'a>>, VersionError> {
        loop {
            self.seen.check()?;
            let Some(node) = self.queue.pop_front() else {
                return Ok(None);
            };
            if !(self.is_limit)(&node) {
                self.queue.extend(node.unseen_parents(&mut self.seen)?);
            }
            if (self.is_valid)(&node) {
                return Ok(Some(node));
            }
        }
    }
}
