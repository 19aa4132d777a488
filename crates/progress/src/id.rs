//! Unique identifiers for progress trackers.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a ProgressTracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackerId(Ulid);

impl TrackerId {
    /// Generate a new TrackerId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TrackerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TrackerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for TrackerId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}
