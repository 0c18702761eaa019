//! Completion tracking for a batch of queued tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Final tally for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub completed: usize,
    pub failed: usize,
}

struct BatchState {
    expected: usize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    notify: Notify,
}

impl BatchState {
    fn settled(&self) -> usize {
        self.completed.load(Ordering::SeqCst) + self.failed.load(Ordering::SeqCst)
    }
}

/// Tracks how many tasks of a known-size batch have settled.
///
/// Hand one [`BatchHandle`] clone to each task's callbacks, then
/// `wait()` for all of them to report in.
pub struct BatchTracker {
    state: Arc<BatchState>,
}

/// Per-task reporting handle, cheap to clone.
#[derive(Clone)]
pub struct BatchHandle {
    state: Arc<BatchState>,
}

impl BatchTracker {
    /// Track a batch of `expected` tasks.
    pub fn new(expected: usize) -> Self {
        Self {
            state: Arc::new(BatchState {
                expected,
                completed: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
                notify: Notify::new(),
            }),
        }
    }

    /// Handle for a task to report its outcome through.
    pub fn handle(&self) -> BatchHandle {
        BatchHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Wait until every expected task has reported.
    pub async fn wait(&self) -> BatchOutcome {
        loop {
            // Register for the wakeup before re-checking, so a report
            // landing between the check and the await is not lost.
            let notified = self.state.notify.notified();
            if self.state.settled() >= self.state.expected {
                break;
            }
            notified.await;
        }
        BatchOutcome {
            completed: self.state.completed.load(Ordering::SeqCst),
            failed: self.state.failed.load(Ordering::SeqCst),
        }
    }
}

impl BatchHandle {
    /// Record one successful task.
    pub fn task_done(&self) {
        self.state.completed.fetch_add(1, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    /// Record one failed task.
    pub fn task_failed(&self) {
        self.state.failed.fetch_add(1, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_resolves_after_all_reports() {
        let tracker = BatchTracker::new(3);
        for i in 0..3 {
            let handle = tracker.handle();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5 * (i + 1))).await;
                if i == 1 {
                    handle.task_failed();
                } else {
                    handle.task_done();
                }
            });
        }

        let outcome = tracker.wait().await;
        assert_eq!(
            outcome,
            BatchOutcome {
                completed: 2,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_empty_batch_resolves_immediately() {
        let tracker = BatchTracker::new(0);
        let outcome = tracker.wait().await;
        assert_eq!(
            outcome,
            BatchOutcome {
                completed: 0,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_reports_before_wait_are_counted() {
        let tracker = BatchTracker::new(2);
        tracker.handle().task_done();
        tracker.handle().task_done();
        let outcome = tracker.wait().await;
        assert_eq!(outcome.completed, 2);
        assert_eq!(outcome.failed, 0);
    }
}
