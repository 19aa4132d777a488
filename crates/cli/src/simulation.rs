//! Simulated multi-worker operation driving a progress tracker.

use anyhow::{anyhow, Result};
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use tomoscope_progress::{ChannelObserver, ProgressEntry, ProgressTracker, TrackerConfig};

/// Configuration for a simulated run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Total steps across all workers
    pub steps: u32,
    /// Number of worker threads
    pub workers: u32,
    /// Simulated time per step
    pub step_delay: Duration,
    /// Percentage interval between logged progress lines
    pub report_every: u32,
}

/// Split `steps` across `workers`, handing the remainder to the first ones.
fn partition(steps: u32, workers: u32) -> Vec<u32> {
    let workers = workers.max(1);
    (0..workers)
        .map(|i| steps / workers + u32::from(i < steps % workers))
        .collect()
}

/// Run the simulation and return the finished tracker.
pub async fn run(
    config: SimulationConfig,
    tracker_config: TrackerConfig,
) -> Result<Arc<ProgressTracker>> {
    let tracker = Arc::new(
        ProgressTracker::new(i64::from(config.steps)).with_config(tracker_config),
    );

    let (tx, rx) = mpsc::channel();
    tracker.attach_observer(ChannelObserver::new(tx));

    let display = spawn_display(Arc::downgrade(&tracker), rx, config.report_every);

    info!(
        task = %tracker.task_name(),
        steps = config.steps,
        workers = config.workers,
        "Starting simulated operation"
    );

    let mut handles = Vec::new();
    for (worker, share) in partition(config.steps, config.workers).into_iter().enumerate() {
        let tracker = tracker.clone();
        let delay = config.step_delay;
        handles.push(tokio::task::spawn_blocking(move || -> Result<()> {
            for item in 0..share {
                std::thread::sleep(delay);
                tracker.update(1, format!("worker {worker} item {item}"))?;
            }
            debug!(worker, share, "Worker finished");
            Ok(())
        }));
    }

    for handle in handles {
        handle.await??;
    }
    tracker.mark_complete()?;

    display
        .await
        .map_err(|err| anyhow!("display task failed: {err}"))?;

    Ok(tracker)
}

/// Log a status line every `report_every` percent.
///
/// Holds only a weak handle so the channel closes, and the thread exits,
/// once the tracker is dropped.
fn spawn_display(
    tracker: Weak<ProgressTracker>,
    rx: mpsc::Receiver<(f64, ProgressEntry)>,
    report_every: u32,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let interval = f64::from(report_every.clamp(1, 100)) / 100.0;
        let mut next_report = interval;

        for (completion, entry) in rx.iter() {
            let Some(live) = tracker.upgrade() else {
                break;
            };
            if entry.message == "complete" {
                info!(task = %live.task_name(), "{}", live.status_line());
                break;
            }
            if completion >= next_report {
                info!(
                    task = %live.task_name(),
                    percent = completion * 100.0,
                    "{}",
                    live.status_line()
                );
                while next_report <= completion {
                    next_report += interval;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_spreads_remainder() {
        assert_eq!(partition(10, 3), vec![4, 3, 3]);
        assert_eq!(partition(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(partition(5, 0), vec![5]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_completes_tracker() {
        let config = SimulationConfig {
            steps: 20,
            workers: 3,
            step_delay: Duration::ZERO,
            report_every: 25,
        };

        let tracker = run(config, TrackerConfig::default()).await.unwrap();

        assert!(tracker.is_completed());
        assert_eq!(tracker.current_step(), 20);
        assert_eq!(tracker.history_len(), 22);
        assert_eq!(tracker.history().last().unwrap().message, "complete");
    }
}
