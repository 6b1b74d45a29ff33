//! Cooperative cancellation for long-running walks and merges.
//!
//! The engine never blocks on its own; graph walks, diffs and merges call
//! [`Cancellation::check`] between steps so an upstream caller can abandon
//! them by cancelling the token or letting the deadline pass.

use crate::error::VersionError;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A handle that never fires unless [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// A handle that fires with this one but can also be cancelled alone.
    /// Keeps the parent's deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Signal every clone and child of this handle.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn check(&self) -> Result<(), VersionError> {
        if self.is_cancelled() {
            Err(VersionError::Cancelled)
        } else {
            Ok(())
        }
    }
}
