//! Observer interface for progress notifications.

use crate::history::ProgressEntry;
use std::sync::mpsc::Sender;

/// Error type for observer notifications.
pub type Result<T> = std::result::Result<T, ObserverError>;

/// Errors an observer can hand back to the producer that called `update`.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// Observer failed while handling the notification
    #[error("observer failed: {0}")]
    Failed(String),

    /// Observer's receiving end has gone away
    #[error("observer disconnected")]
    Disconnected,
}

/// Receives a notification after every progress update.
///
/// Observers run synchronously on the producer's thread once the tracker
/// lock has been released, in registration order. They must not call the
/// tracker's mutating methods from inside `on_progress`.
///
/// Each producer's notifications arrive in the order of its own updates.
/// Notifications from different producers are not guaranteed to arrive in
/// history order; use [`ProgressEntry::step`] or the tracker's history when
/// ordering matters.
pub trait ProgressObserver: Send + Sync {
    /// Called with the rounded completion fraction and the entry just recorded.
    fn on_progress(&self, completion: f64, entry: &ProgressEntry) -> Result<()>;
}

impl<F> ProgressObserver for F
where
    F: Fn(f64, &ProgressEntry) -> Result<()> + Send + Sync,
{
    fn on_progress(&self, completion: f64, entry: &ProgressEntry) -> Result<()> {
        self(completion, entry)
    }
}

/// Forwards every notification to a channel, typically drained by a
/// display thread.
pub struct ChannelObserver {
    sender: Sender<(f64, ProgressEntry)>,
}

impl ChannelObserver {
    /// Create an observer that sends into `sender`.
    pub fn new(sender: Sender<(f64, ProgressEntry)>) -> Self {
        Self { sender }
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, completion: f64, entry: &ProgressEntry) -> Result<()> {
        self.sender
            .send((completion, entry.clone()))
            .map_err(|_| ObserverError::Disconnected)
    }
}

/// An observer that collects notifications for tests.
#[cfg(test)]
#[derive(Default)]
pub struct CollectingObserver {
    seen: std::sync::Mutex<Vec<(f64, ProgressEntry)>>,
}

#[cfg(test)]
impl CollectingObserver {
    /// Notifications received so far.
    pub fn seen(&self) -> Vec<(f64, ProgressEntry)> {
        self.seen.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ProgressObserver for CollectingObserver {
    fn on_progress(&self, completion: f64, entry: &ProgressEntry) -> Result<()> {
        self.seen.lock().unwrap().push((completion, entry.clone()));
        Ok(())
    }
}
