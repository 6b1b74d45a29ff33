//! Conflict resolution policies
//!
//! A resolver is asked only for true conflicts: both sides changed the same
//! path to different results. It returns the change to apply or fails.

use crate::diff::Change;
use crate::error::VersionError;
use std::collections::HashMap;

pub trait ConflictResolver {
    fn resolve(&self, left: &Change, right: &Change) -> Result<Change, VersionError>;
}

impl<F> ConflictResolver for F
where
    F: Fn(&Change, &Change) -> Result<Change, VersionError>,
{
    fn resolve(&self, left: &Change, right: &Change) -> Result<Change, VersionError> {
        self(left, right)
    }
}

/// Picks the side whose resulting fingerprint is lower. A deletion has no
/// resulting fingerprint and always wins. Deterministic, which makes it the
/// resolver of choice in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowestHashResolver;

impl ConflictResolver for LowestHashResolver {
    fn resolve(&self, left: &Change, right: &Change) -> Result<Change, VersionError> {
        if left.to_hash() <= right.to_hash() {
            Ok(left.clone())
        } else {
            Ok(right.clone())
        }
    }
}

/// Always keeps the current branch's side.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeftResolver;

impl ConflictResolver for LeftResolver {
    fn resolve(&self, left: &Change, _right: &Change) -> Result<Change, VersionError> {
        Ok(left.clone())
    }
}

/// Always takes the incoming side.
#[derive(Debug, Clone, Copy, Default)]
pub struct RightResolver;

impl ConflictResolver for RightResolver {
    fn resolve(&self, _left: &Change, right: &Change) -> Result<Change, VersionError> {
        Ok(right.clone())
    }
}

/// Fails on every conflict.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictResolver;

impl ConflictResolver for StrictResolver {
    fn resolve(&self, left: &Change, _right: &Change) -> Result<Change, VersionError> {
        Err(VersionError::Conflict {
            path: left.path.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Explicit per-path choices. Paths without a choice are conflicts.
#[derive(Debug, Clone, Default)]
pub struct PathSelectionResolver {
    choices: HashMap<String, Side>,
}

impl PathSelectionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, path: impl Into<String>, side: Side) -> Self {
        self.choices.insert(path.into(), side);
        self
    }
}

impl FromIterator<(String, Side)> for PathSelectionResolver {
    fn from_iter<I: IntoIterator<Item = (String, Side)>>(iter: I) -> Self {
        Self {
            choices: iter.into_iter().collect(),
        }
    }
}

impl ConflictResolver for PathSelectionResolver {
    fn resolve(&self, left: &Change, right: &Change) -> Result<Change, VersionError> {
        match self.choices.get(&left.path) {
            Some(Side::Left) => Ok(left.clone()),
            Some(Side::Right) => Ok(right.clone()),
            None => Err(VersionError::Conflict {
                path: left.path.clone(),
            }),
        }
    }
}
