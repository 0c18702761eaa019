//! Shared data models for the hclip pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Video segments and target platforms
//! - Transcripts and per-chunk transcript pieces
//! - Highlight ranges returned by the highlight-finding API
//! - Encoding configuration
//! - Typed render progress events

pub mod encoding;
pub mod highlight;
pub mod progress;
pub mod segment;
pub mod timestamp;
pub mod transcript;

// Re-export common types
pub use encoding::EncodingConfig;
pub use highlight::HighlightRange;
pub use progress::{null_progress, progress_channel, ProgressEvent, ProgressSender, RenderPhase};
pub use segment::{Dimensions, SegmentError, TargetPlatform, VideoSegment};
pub use timestamp::{format_seconds, parse_timestamp, TimestampError};
pub use transcript::{Transcript, TranscriptSegment};
