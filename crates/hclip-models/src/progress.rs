//! Typed render progress events.
//!
//! Progress is delivered through an explicit channel rather than an
//! optional callback threaded through every call. Events are emitted
//! at fixed milestones; consumers that do not care attach a
//! [`null_progress`] sender.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Coarse phase of a render operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPhase {
    Initializing,
    InputLoaded,
    ExtractingSegment,
    Concatenating,
    Finalizing,
}

impl std::fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::InputLoaded => "input_loaded",
            Self::ExtractingSegment => "extracting_segment",
            Self::Concatenating => "concatenating",
            Self::Finalizing => "finalizing",
        };
        write!(f, "{}", s)
    }
}

/// A single progress update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Current phase
    pub phase: RenderPhase,
    /// 0-100
    pub percent: u8,
    /// Optional human-readable detail (e.g. "segment 2/5")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProgressEvent {
    pub fn new(phase: RenderPhase, percent: u8) -> Self {
        Self {
            phase,
            percent: percent.min(100),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Sender half of a progress channel.
///
/// Sends are best-effort; a dropped receiver never fails the render.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    /// Emit a milestone event.
    pub fn emit(&self, phase: RenderPhase, percent: u8) {
        let _ = self.tx.send(ProgressEvent::new(phase, percent));
    }

    /// Emit a milestone event with detail text.
    pub fn emit_detail(&self, phase: RenderPhase, percent: u8, detail: impl Into<String>) {
        let _ = self
            .tx
            .send(ProgressEvent::new(phase, percent).with_detail(detail));
    }
}

/// Receiver half of a progress channel.
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Create a connected progress channel.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, rx)
}

/// A sender whose events are discarded.
pub fn null_progress() -> ProgressSender {
    let (tx, _rx) = mpsc::unbounded_channel();
    ProgressSender { tx }
}
