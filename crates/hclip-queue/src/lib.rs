//! Sequential in-process render task queue.
//!
//! This crate provides:
//! - A single-worker queue that serializes render tasks against the
//!   one shared engine instance
//! - Priority ordering with arrival-order tie-breaks
//! - Per-task retry, cancellation of not-yet-started tasks
//! - A `BatchTracker` completion signal for groups of tasks

pub mod batch;
pub mod queue;
pub mod task;

pub use batch::{BatchHandle, BatchOutcome, BatchTracker};
pub use queue::{QueueSettings, RenderQueue};
pub use task::{RenderTask, TaskError, TaskId};
