//! Nested completion scopes.
//!
//! A tracker handed down through several layers of an operation can be
//! wrapped in a [`ProgressScope`] at each layer. Only when the outermost
//! scope ends is the tracker marked complete.

use std::ops::Deref;
use tracing::warn;

use crate::observer::Result;
use crate::tracker::ProgressTracker;

/// Guard returned by [`ProgressTracker::scope`].
#[must_use = "dropping the scope immediately ends it"]
pub struct ProgressScope<'a> {
    tracker: &'a ProgressTracker,
    finished: bool,
}

impl ProgressTracker {
    /// Enter a completion scope.
    pub fn scope(&self) -> ProgressScope<'_> {
        self.enter_scope();
        ProgressScope {
            tracker: self,
            finished: false,
        }
    }
}

impl ProgressScope<'_> {
    /// End the scope, returning any observer error from the final
    /// `complete` notification.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.leave()
    }

    fn leave(&self) -> Result<()> {
        if self.tracker.leave_scope() {
            self.tracker.mark_complete()
        } else {
            Ok(())
        }
    }
}

impl Deref for ProgressScope<'_> {
    type Target = ProgressTracker;

    fn deref(&self) -> &ProgressTracker {
        self.tracker
    }
}

impl Drop for ProgressScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.leave() {
            warn!(
                tracker = %self.tracker.id(),
                error = %err,
                "Observer failed while completing scope"
            );
        }
    }
}
