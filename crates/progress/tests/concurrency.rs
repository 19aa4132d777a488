//! Concurrent producers and observers sharing one tracker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use tomoscope_progress::{ChannelObserver, ProgressEntry, ProgressTracker};

#[tokio::test]
async fn test_blocking_workers_share_tracker() {
    let tracker = Arc::new(ProgressTracker::new(64));
    let (tx, rx) = mpsc::channel();
    tracker.attach_observer(ChannelObserver::new(tx));

    let mut handles = Vec::new();
    for worker in 0..8 {
        let tracker = tracker.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            for slice in 0..25 {
                tracker
                    .update(1, format!("worker {worker} slice {slice}"))
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    tracker.mark_complete().unwrap();

    assert_eq!(tracker.current_step(), 200);
    assert_eq!(tracker.history_len(), 202);
    assert!(tracker.end_step() >= tracker.current_step() + 1);
    assert!(tracker.is_completed());

    let received: Vec<(f64, ProgressEntry)> = rx.try_iter().collect();
    assert_eq!(received.len(), 201);
    assert!(received.iter().all(|(c, _)| (0.0..1.0).contains(c)));
    assert_eq!(received.last().unwrap().1.message, "complete");
}

#[test]
fn test_history_order_matches_lock_order() {
    let tracker = ProgressTracker::new(10);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    tracker.attach_observer(move |_completion: f64, entry: &ProgressEntry| {
        sink.lock().unwrap().push(entry.step);
        Ok(())
    });

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..100 {
                    tracker.update(1, "").unwrap();
                }
            });
        }
    });

    let history = tracker.history();
    assert_eq!(history.len(), 401);
    for (i, entry) in history.iter().enumerate() {
        assert_eq!(entry.step, i as i64);
    }

    // every update notified exactly once, whatever the interleaving
    let mut steps = seen.lock().unwrap().clone();
    steps.sort_unstable();
    assert_eq!(steps, (1..=400).collect::<Vec<i64>>());
}

#[test]
fn test_readers_never_see_torn_state() {
    let tracker = ProgressTracker::new(1);
    let violations = AtomicUsize::new(0);

    std::thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..1000 {
                tracker.update(3, "burst").unwrap();
            }
        });
        s.spawn(|| {
            for _ in 0..1000 {
                let snap = tracker.snapshot();
                if snap.end_step < snap.current_step + 1 || snap.completion >= 1.0 {
                    violations.fetch_add(1, Ordering::SeqCst);
                }
            }
        });
    });

    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert_eq!(tracker.current_step(), 3000);
}

#[test]
fn test_long_run_stays_in_progress_bound() {
    let tracker = ProgressTracker::new(1);

    for _ in 0..1000 {
        tracker.update(3, "burst").unwrap();
        let snap = tracker.snapshot();
        assert!(snap.end_step >= snap.current_step + 1);
        assert!((0.0..1.0).contains(&snap.completion));
    }

    assert_eq!(tracker.current_step(), 3000);
    assert_eq!(tracker.completion(), 0.999);

    tracker.mark_complete().unwrap();
    assert_eq!(tracker.completion(), 1.0);
}
