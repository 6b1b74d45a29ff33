//! Depth-first commit walks

use super::{CommitIter, CommitNode, Seen};
use crate::cancel::Cancellation;
use crate::error::VersionError;
use crate::types::Hash;

/// Yields a commit before any of its parents.
///
/// Keeps a stack of per-commit parent iterators. A merge commit's parents
/// form one frame, which is exhausted before the walk returns to the frame
/// below it.
pub struct PreorderIter<'a> {
    start: Option<CommitNode<'a>>,
    stack: Vec<(CommitNode<'a>, std::vec::IntoIter<Hash>)>,
    seen: Seen,
}

impl<'a> PreorderIter<'a> {
    pub fn new(start: CommitNode<'a>, ignore: &[Hash]) -> Self {
        Self {
            start: Some(start),
            stack: Vec::new(),
            seen: Seen::new(ignore),
        }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.seen.set_cancellation(cancel);
        self
    }

    fn next_from_stack(&mut self) -> Result<Option<CommitNode<'a>>, VersionError> {
        loop {
            let Some((owner, parents)) = self.stack.last_mut() else {
                return Ok(None);
            };
            match parents.next() {
                Some(hash) if self.seen.insert(hash) => return owner.load_related(&hash).map(Some),
                Some(_) => {}
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

impl<'a> CommitIter<'a> for PreorderIter<'a> {
    fn next_commit(&mut self) -> Result<Option<CommitNode<'a>>, VersionError> {
        self.seen.check()?;
        let node = match self.start.take() {
            Some(start) if self.seen.insert(start.hash()) => start,
            Some(_) => return Ok(None),
            None => match self.next_from_stack()? {
                Some(node) => node,
                None => return Ok(None),
            },
        };
        let parents = node.parent_hashes().to_vec().into_iter();
        self.stack.push((node.clone(), parents));
        Ok(Some(node))
    }
}

/// Yields a commit only after all of its ancestors.
pub struct PostorderIter<'a> {
    /// `(node, expanded)`; a node is yielded when popped a second time.
    stack: Vec<(CommitNode<'a>, bool)>,
    seen: Seen,
}

impl<'a> PostorderIter<'a> {
    pub fn new(start: CommitNode<'a>, ignore: &[Hash]) -> Self {
        let seen = Seen::new(ignore);
        let stack = if seen.contains(&start.hash()) {
            Vec::new()
        } else {
            vec![(start, false)]
        };
        Self { stack, seen }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.seen.set_cancellation(cancel);
        self
    }
}

impl<'a> CommitIter<'a> for PostorderIter<'a> {
    fn next_commit(&mut self) -> Result<Option<CommitNode<'a>>, VersionError> {
        loop {
            self.seen.check()?;
            let Some((node, expanded)) = self.stack.pop() else {
                return Ok(None);
            };
            if expanded {
                return Ok(Some(node));
            }
            // Already expanded through another path.
            if !self.seen.insert(node.hash()) {
                continue;
            }

            let mut parents = Vec::new();
            for hash in node.parent_hashes() {
                if !self.seen.contains(hash) {
                    parents.push(node.load_related(hash)?);
                }
            }
            self.stack.push((node, true));
            // First parent ends up on top.
            self.stack.extend(parents.into_iter().rev().map(|p| (p, false)));
        }
    }
}
