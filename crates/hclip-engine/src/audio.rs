//! Audio chunking for the transcription API's size limit, and
//! reassembly of per-chunk transcripts onto the global timeline.

use std::sync::Arc;

use tracing::{debug, info, warn};

use hclip_models::{Transcript, TranscriptSegment};

use crate::command::FfmpegCommand;
use crate::error::{EngineError, EngineResult};
use crate::probe::probe_media;
use crate::session::{EngineLease, EngineManager};

/// Gap inserted between chunks so boundary timestamps never collide.
pub const CHUNK_BOUNDARY_GAP_SECS: f64 = 0.1;

/// Fallback per-chunk length estimate when a chunk produced no
/// timestamped segments to anchor the next offset on.
pub const DEFAULT_CHUNK_SECS: f64 = 15.0;

const AUDIO_INPUT: &str = "audio_input.mp3";
const VIDEO_INPUT: &str = "video_input.mp4";
const AUDIO_TRACK: &str = "audio_track.mp3";
const CHUNK_PREFIX: &str = "chunk_";

/// A time-ordered sub-blob of an audio track.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Position in the chunk sequence, 0-based
    pub index: usize,
    /// Encoded audio bytes
    pub data: Vec<u8>,
}

/// Result of splitting an audio blob.
#[derive(Debug)]
pub struct SplitAudio {
    /// Chunks in timeline order
    pub chunks: Vec<AudioChunk>,
    /// Chunk duration the splitter aimed for, used as the merge
    /// fallback estimate
    pub chunk_seconds: f64,
}

/// Transcription output for one chunk, timestamps local to the chunk.
#[derive(Debug, Clone)]
pub struct ChunkTranscript {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

/// Splits oversized audio with the engine's stream-copy segment muxer.
pub struct AudioSplitter {
    manager: Arc<EngineManager>,
}

impl AudioSplitter {
    pub fn new(manager: Arc<EngineManager>) -> Self {
        Self { manager }
    }

    /// Demux the audio track of a video blob to mp3.
    pub async fn extract_audio(&self, video: &[u8]) -> EngineResult<Vec<u8>> {
        let lease = self.manager.acquire().await?;

        let scratch = [VIDEO_INPUT.to_string(), AUDIO_TRACK.to_string()];
        let result = async {
            lease.write_input(VIDEO_INPUT, video).await?;
            let cmd = FfmpegCommand::new(VIDEO_INPUT, AUDIO_TRACK)
                .no_video()
                .audio_codec("libmp3lame");
            lease.exec(&cmd.build_args()).await?;
            lease.read_file(AUDIO_TRACK).await
        }
        .await;

        cleanup(&lease, &scratch).await;
        result
    }

    /// Split `audio` into chunks no larger than `max_bytes` (best
    /// effort: cuts are time-based, codec bitrate is not assumed
    /// constant).
    ///
    /// Input already within the limit is returned unchanged as a
    /// single chunk without touching the engine.
    pub async fn split(&self, audio: &[u8], max_bytes: usize) -> EngineResult<SplitAudio> {
        if audio.len() <= max_bytes {
            debug!(bytes = audio.len(), "Audio within size limit, no split needed");
            return Ok(SplitAudio {
                chunks: vec![AudioChunk {
                    index: 0,
                    data: audio.to_vec(),
                }],
                chunk_seconds: DEFAULT_CHUNK_SECS,
            });
        }

        let lease = self.manager.acquire().await?;

        let mut scratch = vec![AUDIO_INPUT.to_string()];
        let result = self
            .split_with_engine(&lease, audio, max_bytes, &mut scratch)
            .await;

        cleanup(&lease, &scratch).await;
        result
    }

    async fn split_with_engine(
        &self,
        lease: &EngineLease,
        audio: &[u8],
        max_bytes: usize,
        scratch: &mut Vec<String>,
    ) -> EngineResult<SplitAudio> {
        lease.write_input(AUDIO_INPUT, audio).await?;

        let info = probe_media(lease, AUDIO_INPUT).await?;
        if info.duration <= 0.0 {
            return Err(EngineError::probe_failed(
                "audio duration unavailable, cannot compute chunk length",
            ));
        }

        let chunk_seconds = chunk_duration_secs(info.duration, audio.len(), max_bytes);
        info!(
            duration = info.duration,
            bytes = audio.len(),
            chunk_seconds,
            "Splitting audio into time-based chunks"
        );

        let cmd = FfmpegCommand::new(AUDIO_INPUT, format!("{}%03d.mp3", CHUNK_PREFIX))
            .segment_every(chunk_seconds);
        lease.exec(&cmd.build_args()).await?;

        let mut names = lease.list_files(CHUNK_PREFIX).await?;
        if names.is_empty() {
            return Err(EngineError::MissingOutput(format!("{}*", CHUNK_PREFIX)));
        }
        // The muxer widens the index field past 999, which breaks
        // lexical order; sort by the numeric suffix instead.
        names.sort_by_key(|n| chunk_ordinal(n).unwrap_or(u64::MAX));

        scratch.extend(names.iter().cloned());

        let mut chunks = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let data = lease.read_file(name).await?;
            chunks.push(AudioChunk { index, data });
        }

        Ok(SplitAudio {
            chunks,
            chunk_seconds,
        })
    }
}

/// Numeric index embedded in a chunk file name.
fn chunk_ordinal(name: &str) -> Option<u64> {
    name.strip_prefix(CHUNK_PREFIX)?
        .split('.')
        .next()?
        .parse()
        .ok()
}

/// Fixed chunk duration derived from the measured byte rate, with 10%
/// headroom for codec variance.
fn chunk_duration_secs(duration: f64, total_bytes: usize, max_bytes: usize) -> f64 {
    let ratio = max_bytes as f64 / total_bytes as f64;
    (duration * ratio * 0.9).max(1.0)
}

/// Merge per-chunk transcripts into one continuous transcript.
///
/// Chunks are processed strictly in order. The offset for chunk `n` is
/// the maximum end time among already-merged segments, plus a fixed
/// boundary gap after the first chunk. When no timestamped segments
/// have been merged yet, the offset falls back to
/// `index * fallback_chunk_secs`, which keeps offsets monotonically
/// non-decreasing.
pub fn merge_transcripts(chunks: &[ChunkTranscript], fallback_chunk_secs: f64) -> Transcript {
    let mut segments: Vec<TranscriptSegment> = Vec::new();
    let mut texts: Vec<&str> = Vec::new();

    for (index, chunk) in chunks.iter().enumerate() {
        let mut offset = if segments.is_empty() {
            index as f64 * fallback_chunk_secs
        } else {
            segments.iter().map(|s| s.end).fold(0.0, f64::max)
        };
        if index > 0 {
            offset += CHUNK_BOUNDARY_GAP_SECS;
        }

        for segment in &chunk.segments {
            segments.push(segment.offset_by(offset));
        }

        let text = chunk.text.trim();
        if !text.is_empty() {
            texts.push(text);
        }
    }

    Transcript {
        text: texts.join(" "),
        segments,
    }
}

async fn cleanup(lease: &EngineLease, names: &[String]) {
    for name in names {
        if let Err(e) = lease.remove_file(name).await {
            warn!(file = %name, error = %e, "Scratch cleanup failed");
        }
    }
}
