#![deny(unreachable_patterns)]
//! Embedded FFmpeg engine wrapper for highlight clip assembly.
//!
//! This crate provides:
//! - Single-instance engine session management with staleness-driven
//!   forced reloads
//! - Type-safe FFmpeg command building
//! - Segment extraction and clip assembly with bounded retry
//! - Audio chunking around transcription size limits and transcript
//!   reassembly

pub mod audio;
pub mod command;
pub mod error;
pub mod probe;
pub mod render;
pub mod session;

pub use audio::{
    merge_transcripts, AudioChunk, AudioSplitter, ChunkTranscript, SplitAudio,
    CHUNK_BOUNDARY_GAP_SECS, DEFAULT_CHUNK_SECS,
};
pub use command::{scale_crop_filter, FfmpegCommand};
pub use error::{EngineError, EngineResult, RenderError, RenderResult};
pub use probe::{probe_media, MediaInfo, PROBE_TIMEOUT_SECS};
pub use render::{SegmentRenderer, MAX_RENDER_ATTEMPTS, RETRY_BACKOFF};
pub use session::{
    EngineLease, EngineManager, EngineSession, SessionPolicy, SessionState,
};
