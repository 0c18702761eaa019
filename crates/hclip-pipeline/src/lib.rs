//! End-to-end highlight clipping pipeline.
//!
//! Wires the engine, the task queue, and the collaborator API clients
//! into one flow: probe → extract audio → chunked transcription →
//! highlight finding → queued segment rendering.

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{HighlightPipeline, PipelineOptions, RenderedClip};
