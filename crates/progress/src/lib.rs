//! Progress tracking for long-running imaging operations.
//!
//! Producers (filters, loaders, reconstruction steps) construct a
//! [`ProgressTracker`], call [`ProgressTracker::update`] as work advances and
//! finish with [`ProgressTracker::mark_complete`]. Observers such as progress
//! bars subscribe through [`ProgressObserver`].

#![warn(missing_docs)]

mod id;
pub mod history;
pub mod observer;
pub mod scope;
pub mod tracker;

pub use id::TrackerId;
pub use history::{format_hms, ProgressEntry, Time, STEPS_TO_AVERAGE};
pub use observer::{ChannelObserver, ObserverError, ProgressObserver, Result};
pub use scope::ProgressScope;
pub use tracker::{ProgressSnapshot, ProgressTracker, TrackerConfig};
