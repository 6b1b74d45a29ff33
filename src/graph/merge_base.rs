//! Merge-Base Resolver
//!
//! Lowest common ancestors of two commits. Usually one, several when
//! histories criss-cross.

use super::{BfsIter, CommitIter, CommitNode, FilteredBfsIter};
use crate::cancel::Cancellation;
use crate::error::VersionError;
use crate::object::Commit;
use crate::store::CommitRepo;
use crate::types::Hash;
use std::collections::HashSet;
use std::ops::ControlFlow;
use tracing::debug;
use uuid::Uuid;

/// True when `ancestor` is reachable from `descendant`. A commit is its own
/// ancestor.
pub fn is_ancestor(
    commits: &dyn CommitRepo,
    repository_id: Uuid,
    ancestor: &Hash,
    descendant: &Hash,
    cancel: &Cancellation,
) -> Result<bool, VersionError> {
    if ancestor == descendant {
        return Ok(true);
    }
    let start = CommitNode::load(commits, repository_id, descendant)?;
    let mut found = false;
    BfsIter::new(start, &[])
        .with_cancellation(cancel.clone())
        .for_each(|node| {
            if node.hash() == *ancestor {
                found = true;
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        })?;
    Ok(found)
}

fn reachable(start: CommitNode<'_>, cancel: &Cancellation) -> Result<HashSet<Hash>, VersionError> {
    let hashes = BfsIter::new(start, &[]).with_cancellation(cancel.clone()).hashes()?;
    Ok(hashes.into_iter().collect())
}

/// Lowest common ancestors of `a` and `b`, newest committer time first
/// (ties by fingerprint). Empty when the histories share nothing.
pub fn merge_bases(
    commits: &dyn CommitRepo,
    repository_id: Uuid,
    a: &Hash,
    b: &Hash,
    cancel: &Cancellation,
) -> Result<Vec<Commit>, VersionError> {
    let start_a = CommitNode::load(commits, repository_id, a)?;
    if a == b {
        return Ok(vec![start_a.into_commit()]);
    }
    let from_a = reachable(start_a, cancel)?;

    // Walk from b, stopping at the first commits also reachable from a:
    // anything behind them is a common ancestor but not a lowest one.
    let start_b = CommitNode::load(commits, repository_id, b)?;
    let candidates: Vec<CommitNode<'_>> = {
        let mut iter = FilteredBfsIter::new(
            start_b,
            &[],
            |n: &CommitNode<'_>| from_a.contains(&n.hash()),
            |n: &CommitNode<'_>| from_a.contains(&n.hash()),
        )
        .with_cancellation(cancel.clone());
        let mut out = Vec::new();
        while let Some(node) = iter.next_commit()? {
            out.push(node);
        }
        out
    };

    // A candidate reachable from another candidate is not lowest.
    let mut lowest = Vec::new();
    for candidate in &candidates {
        let mut redundant = false;
        for other in &candidates {
            if other.hash() == candidate.hash() {
                continue;
            }
            if is_ancestor(commits, repository_id, &candidate.hash(), &other.hash(), cancel)? {
                redundant = true;
                break;
            }
        }
        if !redundant {
            lowest.push(candidate.commit().clone());
        }
    }

    lowest.sort_by(|x, y| {
        y.committer
            .when
            .cmp(&x.committer.when)
            .then_with(|| x.hash.cmp(&y.hash))
    });
    debug!(
        a = %a.short(),
        b = %b.short(),
        candidates = candidates.len(),
        bases = lowest.len(),
        "Resolved merge bases"
    );
    Ok(lowest)
}
