//! Step-based progress tracking service.
//!
//! A [`ProgressTracker`] is created by the operation doing the work and
//! shared (usually behind an `Arc`) with whoever wants to watch it. Any
//! number of producer threads may call [`ProgressTracker::update`]; every
//! update is applied under one lock and then fanned out to the attached
//! observers on the caller's thread.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info};

use crate::history::{self, ProgressEntry, Time, STEPS_TO_AVERAGE};
use crate::id::TrackerId;
use crate::observer::{ProgressObserver, Result};

/// Configuration for a progress tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Name reported in logs and status output
    pub task_name: String,

    /// How many of the newest history entries feed the ETA estimate
    pub steps_to_average: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            task_name: "Task".to_string(),
            steps_to_average: STEPS_TO_AVERAGE,
        }
    }
}

/// A consistent view of tracker state taken under the lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// When snapshot was taken
    pub timestamp: Time,

    /// Steps completed so far
    pub current_step: i64,

    /// Estimated total, always ahead of `current_step` while in progress
    pub end_step: i64,

    /// Whether the tracker was marked complete
    pub complete: bool,

    /// Rounded completion fraction
    pub completion: f64,

    /// Number of history entries
    pub history_len: usize,
}

struct State {
    current_step: i64,
    end_step: i64,
    complete: bool,
    history: Vec<ProgressEntry>,
    extra_info: Option<Value>,
    scope_depth: usize,
}

impl State {
    fn completion(&self) -> f64 {
        if self.end_step == 0 {
            return 0.0;
        }
        let fraction = round_to_thousandths(self.current_step as f64 / self.end_step as f64);
        if self.complete {
            fraction
        } else {
            // rounding must not report a running task as finished
            fraction.min(MAX_RUNNING_COMPLETION)
        }
    }

    fn eta(&self, window: usize) -> Duration {
        let remaining = self.end_step.saturating_sub(self.current_step).max(0);
        let remaining = i32::try_from(remaining).unwrap_or(i32::MAX);
        history::mean_step_time(&self.history, window)
            .checked_mul(remaining)
            .unwrap_or(Duration::MAX)
    }
}

/// Largest completion reported before the tracker is marked complete.
const MAX_RUNNING_COMPLETION: f64 = 0.999;

/// Largest step count; keeps room for `end_step` one step ahead.
const MAX_STEP: i64 = i64::MAX - 1;

fn round_to_thousandths(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Thread-safe step counter with observer notification.
pub struct ProgressTracker {
    id: TrackerId,
    config: TrackerConfig,
    state: Mutex<State>,
    observers: RwLock<Vec<Arc<dyn ProgressObserver>>>,
}

impl ProgressTracker {
    /// Create a tracker expecting roughly `num_steps` steps.
    ///
    /// The history starts with an `init` entry at step 0.
    pub fn new(num_steps: i64) -> Self {
        let tracker = Self {
            id: TrackerId::new(),
            config: TrackerConfig::default(),
            state: Mutex::new(State {
                current_step: 0,
                end_step: num_steps.saturating_add(1),
                complete: false,
                history: Vec::new(),
                extra_info: None,
                scope_depth: 0,
            }),
            observers: RwLock::new(Vec::new()),
        };

        debug!(
            tracker = %tracker.id,
            task = %tracker.config.task_name,
            estimate = num_steps,
            "Created progress tracker"
        );

        // No observers can be attached yet, so only the state change applies.
        tracker.apply(0, "init".to_string(), None);
        tracker
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        debug!(
            tracker = %self.id,
            task = %self.config.task_name,
            steps_to_average = self.config.steps_to_average,
            "Configured progress tracker"
        );
        self
    }

    /// Return `existing` if given, otherwise a fresh tracker.
    ///
    /// When `num_steps` is given the estimate is overwritten either way.
    pub fn ensure(existing: Option<Arc<Self>>, num_steps: Option<i64>) -> Arc<Self> {
        let tracker = existing.unwrap_or_else(|| Arc::new(Self::default()));
        if let Some(steps) = num_steps {
            tracker.set_estimated_steps(steps);
        }
        tracker
    }

    /// Unique identifier of this tracker.
    pub fn id(&self) -> TrackerId {
        self.id
    }

    /// Name of the tracked task.
    pub fn task_name(&self) -> &str {
        &self.config.task_name
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the estimate: `end_step` becomes `num_steps + 1`.
    ///
    /// The estimate may drop below the current step; the next update
    /// raises it again.
    pub fn set_estimated_steps(&self, num_steps: i64) {
        self.lock().end_step = num_steps.saturating_add(1);
    }

    /// Grow the estimate by `num_steps`.
    pub fn add_estimated_steps(&self, num_steps: i64) {
        let mut state = self.lock();
        state.end_step = state.end_step.saturating_add(num_steps);
    }

    /// Register an observer for all subsequent updates.
    pub fn attach_observer<O>(&self, observer: O)
    where
        O: ProgressObserver + 'static,
    {
        self.attach_shared(Arc::new(observer));
    }

    /// Register an observer that is also held elsewhere.
    pub fn attach_shared(&self, observer: Arc<dyn ProgressObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Advance by `steps` and notify observers.
    ///
    /// The state change always happens. The error, if any, comes from the
    /// first observer that failed; observers after it are not called.
    pub fn update(&self, steps: i64, message: impl Into<String>) -> Result<()> {
        let (completion, entry) = self.apply(steps, message.into(), None);
        self.notify(completion, &entry)
    }

    /// Like [`update`](Self::update), also replacing the extra information
    /// attached to the tracker.
    pub fn update_with_info(
        &self,
        steps: i64,
        message: impl Into<String>,
        info: Value,
    ) -> Result<()> {
        let (completion, entry) = self.apply(steps, message.into(), Some(info));
        self.notify(completion, &entry)
    }

    /// Mark the task complete and record a final `complete` entry.
    ///
    /// Calling this again records another entry; the flag stays set.
    pub fn mark_complete(&self) -> Result<()> {
        self.lock().complete = true;
        let result = self.update(0, "complete");

        info!(
            tracker = %self.id,
            task = %self.config.task_name,
            "Elapsed time: {} sec.",
            self.execution_time().num_seconds()
        );

        result
    }

    fn apply(&self, steps: i64, message: String, info: Option<Value>) -> (f64, ProgressEntry) {
        let mut state = self.lock();

        state.current_step = state.current_step.saturating_add(steps).min(MAX_STEP);
        // end_step stays strictly ahead of current_step
        if state.current_step >= state.end_step {
            state.end_step = state.current_step + 1;
        }

        let entry = ProgressEntry::new(state.current_step, message);
        state.history.push(entry.clone());
        state.extra_info = info;

        debug!(
            tracker = %self.id,
            step = state.current_step,
            end = state.end_step,
            message = %entry.message,
            "Progress update"
        );

        (state.completion(), entry)
    }

    fn notify(&self, completion: f64, entry: &ProgressEntry) -> Result<()> {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for observer in &observers {
            observer.on_progress(completion, entry)?;
        }
        Ok(())
    }

    /// Whether at least one step has been recorded.
    pub fn is_started(&self) -> bool {
        self.lock().current_step > 0
    }

    /// Whether [`mark_complete`](Self::mark_complete) has been called.
    pub fn is_completed(&self) -> bool {
        self.lock().complete
    }

    /// `current_step / end_step`, rounded to three decimals.
    pub fn completion(&self) -> f64 {
        self.lock().completion()
    }

    /// Steps completed so far.
    pub fn current_step(&self) -> i64 {
        self.lock().current_step
    }

    /// Current estimate of the total.
    pub fn end_step(&self) -> i64 {
        self.lock().end_step
    }

    /// Message of the newest entry, or `None` when it is empty.
    pub fn last_status_message(&self) -> Option<String> {
        self.lock()
            .history
            .last()
            .map(|entry| entry.message.clone())
            .filter(|message| !message.is_empty())
    }

    /// Extra information supplied with the newest update, if any.
    pub fn extra_info(&self) -> Option<Value> {
        self.lock().extra_info.clone()
    }

    /// Time from the first real update to the newest one.
    pub fn execution_time(&self) -> Duration {
        history::execution_time(&self.lock().history)
    }

    /// Mean time per update over the configured window.
    pub fn mean_step_time(&self) -> Duration {
        history::mean_step_time(&self.lock().history, self.config.steps_to_average)
    }

    /// Estimated time until `end_step` is reached.
    pub fn eta(&self) -> Duration {
        self.lock().eta(self.config.steps_to_average)
    }

    /// Human-readable status for the newest entry.
    pub fn status_line(&self) -> String {
        let state = self.lock();
        let message = state
            .history
            .last()
            .map(|entry| entry.message.as_str())
            .unwrap_or_default();

        format!(
            "{} | {}/{} | Time: {}, ETA: {}",
            message,
            state.current_step,
            state.end_step,
            history::format_hms(history::execution_time(&state.history)),
            history::format_hms(state.eta(self.config.steps_to_average)),
        )
    }

    /// Copy of the full history, oldest first.
    pub fn history(&self) -> Vec<ProgressEntry> {
        self.lock().history.clone()
    }

    /// Number of history entries.
    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    /// Take a progress snapshot.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.lock();
        ProgressSnapshot {
            timestamp: Utc::now(),
            current_step: state.current_step,
            end_step: state.end_step,
            complete: state.complete,
            completion: state.completion(),
            history_len: state.history.len(),
        }
    }

    pub(crate) fn enter_scope(&self) {
        self.lock().scope_depth += 1;
    }

    /// Returns true when the outermost scope was left.
    pub(crate) fn leave_scope(&self) -> bool {
        let mut state = self.lock();
        if state.scope_depth == 0 {
            return false;
        }
        state.scope_depth -= 1;
        state.scope_depth == 0
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(1)
    }
}

impl fmt::Display for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Progress(")?;
        for entry in self.lock().history.iter() {
            writeln!(f, "{entry}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("id", &self.id)
            .field("task_name", &self.config.task_name)
            .field("snapshot", &self.snapshot())
            .field("observers", &self.observer_count())
            .finish()
    }
}
