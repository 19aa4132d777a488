//! Progress history entries and timing helpers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type
pub type Time = DateTime<Utc>;

/// Number of newest history entries used to average step time.
pub const STEPS_TO_AVERAGE: usize = 30;

/// One recorded progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// When the update was applied
    pub timestamp: Time,

    /// Step reached after the update
    pub step: i64,

    /// Message supplied by the producer
    pub message: String,
}

impl ProgressEntry {
    /// Create an entry stamped with the current time.
    pub fn new(step: i64, message: impl Into<String>) -> Self {
        Self::at(Utc::now(), step, message)
    }

    /// Create an entry with an explicit timestamp.
    pub fn at(timestamp: Time, step: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            step,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProgressEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {:?})",
            self.timestamp.to_rfc3339(),
            self.step,
            self.message
        )
    }
}

/// Mean time between consecutive entries over the newest `window` entries.
///
/// Returns zero when fewer than two entries exist.
pub fn mean_step_time(history: &[ProgressEntry], window: usize) -> Duration {
    if history.len() < 2 {
        return Duration::zero();
    }

    let span = window.clamp(2, history.len());
    let newest = &history[history.len() - 1];
    let oldest = &history[history.len() - span];

    (newest.timestamp - oldest.timestamp) / (span as i32 - 1)
}

/// Elapsed time from the first real update to the newest entry.
///
/// The `init` entry at index 0 is excluded, so anything with two or fewer
/// entries reports zero.
pub fn execution_time(history: &[ProgressEntry]) -> Duration {
    if history.len() > 2 {
        history[history.len() - 1].timestamp - history[1].timestamp
    } else {
        Duration::zero()
    }
}

/// Render a duration as zero-padded `HH:MM:SS`.
pub fn format_hms(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        total % 3600 / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry_at(secs: i64, step: i64) -> ProgressEntry {
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        ProgressEntry::at(base + Duration::seconds(secs), step, "")
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(Duration::seconds(0)), "00:00:00");
        assert_eq!(format_hms(Duration::seconds(1)), "00:00:01");
        assert_eq!(format_hms(Duration::seconds(61)), "00:01:01");
        assert_eq!(format_hms(Duration::seconds(3599)), "00:59:59");
        assert_eq!(format_hms(Duration::seconds(3666)), "01:01:06");
    }

    #[test]
    fn test_format_hms_negative_clamps_to_zero() {
        assert_eq!(format_hms(Duration::seconds(-5)), "00:00:00");
    }

    #[test]
    fn test_mean_step_time() {
        let mut history = vec![entry_at(100, 0)];
        assert_eq!(mean_step_time(&history, STEPS_TO_AVERAGE), Duration::zero());

        // first step 5 seconds
        history.push(entry_at(105, 1));
        assert_eq!(mean_step_time(&history, STEPS_TO_AVERAGE), Duration::seconds(5));

        // second step 10 seconds
        history.push(entry_at(115, 2));
        assert_eq!(
            mean_step_time(&history, STEPS_TO_AVERAGE),
            Duration::milliseconds(7500)
        );

        // many 2 second steps push the older ones out of the window
        for i in 1..50 {
            history.push(entry_at(115 + i * 2, 2 + i * 2));
        }
        assert_eq!(mean_step_time(&history, STEPS_TO_AVERAGE), Duration::seconds(2));
    }

    #[test]
    fn test_mean_step_time_tiny_window() {
        let history = vec![entry_at(0, 0), entry_at(4, 1), entry_at(10, 2)];
        assert_eq!(mean_step_time(&history, 0), Duration::seconds(6));
    }

    #[test]
    fn test_execution_time_skips_init_entry() {
        let mut history = vec![entry_at(0, 0), entry_at(10, 1)];
        assert_eq!(execution_time(&history), Duration::zero());

        history.push(entry_at(25, 2));
        assert_eq!(execution_time(&history), Duration::seconds(15));
    }

    #[test]
    fn test_entry_display() {
        let entry = entry_at(0, 3);
        assert!(entry.to_string().ends_with(", 3, \"\")"));
    }
}
