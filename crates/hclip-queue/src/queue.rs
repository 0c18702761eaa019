//! Single-worker task queue.
//!
//! At most one task executes at a time no matter how many are
//! enqueued, mirroring the engine's single-instance constraint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::task::{RenderTask, TaskId};

/// Queue tuning knobs.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Delay before a failed task's single retry.
    pub retry_delay: Duration,
    /// Pause after each completed task, yielding the runtime before
    /// the next one drains.
    pub task_gap: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(500),
            task_gap: Duration::from_millis(100),
        }
    }
}

struct PendingTask {
    task: RenderTask,
    /// Arrival order, breaks priority ties.
    seq: u64,
}

struct QueueInner {
    pending: Vec<PendingTask>,
    next_seq: u64,
    draining: bool,
}

/// Serializes independently-triggered render tasks into a
/// single-worker pipeline.
#[derive(Clone)]
pub struct RenderQueue {
    inner: Arc<Mutex<QueueInner>>,
    settings: Arc<QueueSettings>,
}

impl RenderQueue {
    /// Create a queue with the given settings.
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                pending: Vec::new(),
                next_seq: 0,
                draining: false,
            })),
            settings: Arc::new(settings),
        }
    }

    /// Add a task and start the drain worker if idle.
    ///
    /// Returns the task id for cancellation.
    pub fn enqueue(&self, task: RenderTask) -> TaskId {
        let id = task.id();
        let start_drain = {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.pending.push(PendingTask { task, seq });
            debug!(task_id = %id, pending = inner.pending.len(), "Task enqueued");
            if inner.draining {
                false
            } else {
                inner.draining = true;
                true
            }
        };

        if start_drain {
            let queue = self.clone();
            tokio::spawn(async move { queue.drain().await });
        }
        id
    }

    /// Remove a not-yet-started task.
    ///
    /// Returns `false` when the task is unknown or already executing;
    /// a running task cannot be interrupted.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        let before = inner.pending.len();
        inner.pending.retain(|p| p.task.id() != id);
        let removed = inner.pending.len() < before;
        if removed {
            debug!(task_id = %id, "Task cancelled before start");
        }
        removed
    }

    /// Number of tasks waiting to start.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").pending.len()
    }

    /// Run tasks one at a time until the queue empties.
    async fn drain(&self) {
        loop {
            let next = {
                let mut inner = self.inner.lock().expect("queue lock poisoned");
                // Re-sorted before every pick so late arrivals with an
                // earlier priority still run first.
                inner
                    .pending
                    .sort_by_key(|p| (p.task.priority, p.seq));
                if inner.pending.is_empty() {
                    inner.draining = false;
                    return;
                }
                inner.pending.remove(0)
            };

            self.run_task(next.task).await;
            tokio::time::sleep(self.settings.task_gap).await;
        }
    }

    /// Execute one task with a single retry on failure.
    async fn run_task(&self, task: RenderTask) {
        let id = task.id();
        let result = match (task.action)().await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(task_id = %id, error = %first, "Task failed, retrying once");
                tokio::time::sleep(self.settings.retry_delay).await;
                (task.action)().await
            }
        };

        match result {
            Ok(()) => {
                debug!(task_id = %id, "Task completed");
                if let Some(callback) = task.on_success {
                    callback();
                }
            }
            Err(e) => {
                // A failed task never blocks the tasks behind it.
                error!(task_id = %id, error = %e, "Task failed after retry, dropping");
                if let Some(callback) = task.on_failure {
                    callback(&e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn settings() -> QueueSettings {
        QueueSettings {
            retry_delay: Duration::from_millis(10),
            task_gap: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_priority_order_overrides_arrival_order() {
        let queue = RenderQueue::new(settings());
        let order = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let done_tx = Arc::new(Mutex::new(Some(done_tx)));

        // A long-running first task keeps the worker busy so the
        // remaining tasks are all pending when sorting happens.
        queue.enqueue(RenderTask::new(0, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        }));

        for priority in [3u32, 1, 2] {
            let order = Arc::clone(&order);
            let done_tx = Arc::clone(&done_tx);
            let task = RenderTask::new(priority, move || {
                let order = Arc::clone(&order);
                let done_tx = Arc::clone(&done_tx);
                async move {
                    let mut order = order.lock().unwrap();
                    order.push(priority);
                    if order.len() == 3 {
                        if let Some(tx) = done_tx.lock().unwrap().take() {
                            let _ = tx.send(());
                        }
                    }
                    Ok(())
                }
            });
            queue.enqueue(task);
        }

        done_rx.await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failing_task_retries_once_then_fires_failure_callback() {
        let queue = RenderQueue::new(settings());
        let attempts = Arc::new(AtomicU32::new(0));
        let failures = Arc::new(AtomicU32::new(0));
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();

        let attempts_in = Arc::clone(&attempts);
        let failures_in = Arc::clone(&failures);
        let task = RenderTask::new(0, move || {
            let attempts = Arc::clone(&attempts_in);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), TaskError>("render blew up".into())
            }
        })
        .on_failure(move |_| {
            failures_in.fetch_add(1, Ordering::SeqCst);
        });
        queue.enqueue(task);

        // A follow-up task proves the failure did not block the queue.
        let done_tx = Arc::new(Mutex::new(Some(done_tx)));
        queue.enqueue(RenderTask::new(1, move || {
            let done_tx = Arc::clone(&done_tx);
            async move {
                if let Some(tx) = done_tx.lock().unwrap().take() {
                    let _ = tx.send(());
                }
                Ok(())
            }
        }));

        done_rx.await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_pending_task() {
        let queue = RenderQueue::new(settings());
        let ran = Arc::new(AtomicU32::new(0));

        // Block the worker first.
        queue.enqueue(RenderTask::new(0, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        }));

        let ran_in = Arc::clone(&ran);
        let id = queue.enqueue(RenderTask::new(1, move || {
            let ran = Arc::clone(&ran_in);
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        assert!(queue.cancel(id));
        // Cancelling again is a no-op.
        assert!(!queue.cancel(id));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_tasks_never_overlap() {
        let queue = RenderQueue::new(settings());
        let running = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let done_tx = Arc::new(Mutex::new(Some(done_tx)));
        let total = 5u32;
        let completed = Arc::new(AtomicU32::new(0));

        for i in 0..total {
            let running = Arc::clone(&running);
            let max_seen = Arc::clone(&max_seen);
            let completed = Arc::clone(&completed);
            let done_tx = Arc::clone(&done_tx);
            queue.enqueue(RenderTask::new(i, move || {
                let running = Arc::clone(&running);
                let max_seen = Arc::clone(&max_seen);
                let completed = Arc::clone(&completed);
                let done_tx = Arc::clone(&done_tx);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    if completed.fetch_add(1, Ordering::SeqCst) + 1 == total {
                        if let Some(tx) = done_tx.lock().unwrap().take() {
                            let _ = tx.send(());
                        }
                    }
                    Ok(())
                }
            }));
        }

        done_rx.await.unwrap();
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
