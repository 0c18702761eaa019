//! Render task definition.

use futures::future::BoxFuture;
use uuid::Uuid;

/// Task identifier, used for cancellation.
pub type TaskId = Uuid;

/// Error type surfaced by task actions.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

type TaskAction = Box<dyn Fn() -> BoxFuture<'static, Result<(), TaskError>> + Send + Sync>;
type SuccessCallback = Box<dyn FnOnce() + Send>;
type FailureCallback = Box<dyn FnOnce(&TaskError) + Send>;

/// A unit of queued render work.
///
/// The action is a zero-argument async factory so the queue can invoke
/// it again on retry. Lower priority values run earlier.
pub struct RenderTask {
    pub(crate) id: TaskId,
    pub(crate) priority: u32,
    pub(crate) action: TaskAction,
    pub(crate) on_success: Option<SuccessCallback>,
    pub(crate) on_failure: Option<FailureCallback>,
}

impl RenderTask {
    /// Create a task from a priority and an async action factory.
    pub fn new<F, Fut>(priority: u32, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            priority,
            action: Box::new(move || Box::pin(action())),
            on_success: None,
            on_failure: None,
        }
    }

    /// The task's id, for later cancellation.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Attach a completion callback.
    pub fn on_success(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Attach a failure callback, fired once after retries exhaust.
    pub fn on_failure(mut self, callback: impl FnOnce(&TaskError) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for RenderTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTask")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
