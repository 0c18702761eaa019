//! Segment extraction and clip assembly.
//!
//! Given a source video blob and an ordered list of time ranges, the
//! renderer produces a single output clip. One range is extracted
//! straight to the final container; several ranges go through
//! per-range intermediates and one concat-demuxer pass so the output
//! clip order always matches the input list order.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use hclip_models::{
    Dimensions, EncodingConfig, ProgressSender, RenderPhase, VideoSegment,
};

use crate::command::{scale_crop_filter, FfmpegCommand};
use crate::error::{EngineError, EngineResult, RenderError, RenderResult};
use crate::session::{EngineLease, EngineManager};

/// Whole-operation attempts before the last error is surfaced.
pub const MAX_RENDER_ATTEMPTS: u32 = 2;
/// Fixed backoff between attempts.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

const INPUT_FILE: &str = "input.mp4";
const OUTPUT_FILE: &str = "output.mp4";
const MANIFEST_FILE: &str = "concat.txt";

/// Renders highlight segments through the shared engine session.
pub struct SegmentRenderer {
    manager: Arc<EngineManager>,
    encoding: EncodingConfig,
}

impl SegmentRenderer {
    /// Create a renderer using the given session manager.
    pub fn new(manager: Arc<EngineManager>, encoding: EncodingConfig) -> Self {
        Self { manager, encoding }
    }

    /// Cut the requested ranges out of `source` and assemble one clip.
    ///
    /// Invalid input fails immediately. Engine failures are retried up
    /// to [`MAX_RENDER_ATTEMPTS`] times; each failing attempt releases
    /// the session so the next attempt starts from a fresh load.
    pub async fn render(
        &self,
        source: &[u8],
        segments: &[VideoSegment],
        dims: Option<Dimensions>,
        progress: &ProgressSender,
    ) -> RenderResult<Vec<u8>> {
        validate_segments(segments)?;
        let plan = plan_render(segments, dims, &self.encoding);

        let mut last_err = EngineError::NoSession;
        for attempt in 1..=MAX_RENDER_ATTEMPTS {
            match self.render_attempt(source, &plan, progress).await {
                Ok(output) => return Ok(output),
                Err(e) => {
                    warn!(attempt, error = %e, "Render attempt failed, releasing session");
                    self.manager.release();
                    last_err = e;
                }
            }
            if attempt < MAX_RENDER_ATTEMPTS {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }

        Err(RenderError::AttemptsExhausted {
            attempts: MAX_RENDER_ATTEMPTS,
            source: last_err,
        })
    }

    /// Fast path: concatenate already-rendered clips via stream copy.
    ///
    /// Preferred whenever per-segment clips exist, since it avoids a
    /// second full re-encode.
    pub async fn concat_rendered(&self, clips: &[Vec<u8>]) -> RenderResult<Vec<u8>> {
        if clips.is_empty() {
            return Err(RenderError::invalid_segments(
                "at least one rendered clip is required",
            ));
        }

        let mut last_err = EngineError::NoSession;
        for attempt in 1..=MAX_RENDER_ATTEMPTS {
            match self.concat_attempt(clips).await {
                Ok(output) => return Ok(output),
                Err(e) => {
                    warn!(attempt, error = %e, "Concat attempt failed, releasing session");
                    self.manager.release();
                    last_err = e;
                }
            }
            if attempt < MAX_RENDER_ATTEMPTS {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }

        Err(RenderError::AttemptsExhausted {
            attempts: MAX_RENDER_ATTEMPTS,
            source: last_err,
        })
    }

    async fn render_attempt(
        &self,
        source: &[u8],
        plan: &RenderPlan,
        progress: &ProgressSender,
    ) -> EngineResult<Vec<u8>> {
        let lease = self.manager.acquire().await?;
        progress.emit(RenderPhase::Initializing, 0);
        lease.verify().await?;

        let result = self.execute_plan(&lease, source, plan, progress).await;
        cleanup_scratch(&lease, &plan.scratch).await;
        result
    }

    async fn execute_plan(
        &self,
        lease: &EngineLease,
        source: &[u8],
        plan: &RenderPlan,
        progress: &ProgressSender,
    ) -> EngineResult<Vec<u8>> {
        lease.write_input(INPUT_FILE, source).await?;
        progress.emit(RenderPhase::InputLoaded, 10);

        let total = plan.extract.len();
        for (i, cmd) in plan.extract.iter().enumerate() {
            let percent = 10 + ((i as u32 * 70) / total as u32) as u8;
            progress.emit_detail(
                RenderPhase::ExtractingSegment,
                percent,
                format!("segment {}/{}", i + 1, total),
            );
            lease.exec(&cmd.build_args()).await?;
        }

        if let Some(manifest) = &plan.manifest {
            lease.write_input(MANIFEST_FILE, manifest.as_bytes()).await?;
        }
        if let Some(concat) = &plan.concat {
            progress.emit(RenderPhase::Concatenating, 85);
            lease.exec(&concat.build_args()).await?;
        }

        let output = lease.read_file(OUTPUT_FILE).await?;
        progress.emit(RenderPhase::Finalizing, 100);
        info!(bytes = output.len(), segments = total, "Render produced output clip");
        Ok(output)
    }

    async fn concat_attempt(&self, clips: &[Vec<u8>]) -> EngineResult<Vec<u8>> {
        let lease = self.manager.acquire().await?;
        lease.verify().await?;

        let mut scratch = Vec::with_capacity(clips.len() + 2);
        let result = async {
            let mut manifest = String::new();
            for (i, clip) in clips.iter().enumerate() {
                let name = format!("clip_{:03}.mp4", i);
                lease.write_input(&name, clip).await?;
                manifest.push_str(&format!("file '{}'\n", name));
                scratch.push(name);
            }
            lease.write_input(MANIFEST_FILE, manifest.as_bytes()).await?;
            scratch.push(MANIFEST_FILE.to_string());

            let cmd = FfmpegCommand::new(MANIFEST_FILE, OUTPUT_FILE)
                .concat_manifest()
                .stream_copy();
            scratch.push(OUTPUT_FILE.to_string());
            lease.exec(&cmd.build_args()).await?;

            lease.read_file(OUTPUT_FILE).await
        }
        .await;

        cleanup_scratch(&lease, &scratch).await;
        result
    }
}

/// Ordered set of engine commands for one render.
struct RenderPlan {
    /// Per-range extraction commands, in input list order.
    extract: Vec<FfmpegCommand>,
    /// Concat manifest content, absent on the single-segment path.
    manifest: Option<String>,
    /// Final concatenation command, absent on the single-segment path.
    concat: Option<FfmpegCommand>,
    /// Scratch files the plan creates, for cleanup.
    scratch: Vec<String>,
}

fn validate_segments(segments: &[VideoSegment]) -> Result<(), RenderError> {
    if segments.is_empty() {
        return Err(RenderError::invalid_segments(
            "at least one segment is required",
        ));
    }
    for (i, segment) in segments.iter().enumerate() {
        segment
            .validate()
            .map_err(|e| RenderError::invalid_segments(format!("segment {}: {}", i, e)))?;
    }
    Ok(())
}

fn plan_render(
    segments: &[VideoSegment],
    dims: Option<Dimensions>,
    encoding: &EncodingConfig,
) -> RenderPlan {
    let mut scratch = vec![INPUT_FILE.to_string(), OUTPUT_FILE.to_string()];

    if let [segment] = segments {
        // Single range: extract straight into the final container,
        // skipping the concatenation step and its edge cases.
        let mut cmd = FfmpegCommand::new(INPUT_FILE, OUTPUT_FILE)
            .seek(segment.start)
            .duration(segment.duration())
            .encode_with(encoding);
        if let Some(d) = dims {
            cmd = cmd.video_filter(scale_crop_filter(d.width, d.height));
        }
        return RenderPlan {
            extract: vec![cmd],
            manifest: None,
            concat: None,
            scratch,
        };
    }

    // Multiple ranges: re-encode each to its own intermediate for
    // frame-accurate cuts, then one concat pass over the manifest.
    let mut extract = Vec::with_capacity(segments.len());
    let mut manifest = String::new();
    for (i, segment) in segments.iter().enumerate() {
        let name = format!("seg_{:03}.mp4", i);
        extract.push(
            FfmpegCommand::new(INPUT_FILE, &name)
                .seek(segment.start)
                .duration(segment.duration())
                .encode_with(encoding),
        );
        manifest.push_str(&format!("file '{}'\n", name));
        scratch.push(name);
    }
    scratch.push(MANIFEST_FILE.to_string());

    let concat = match dims {
        // Re-encode once more so every segment lands on a uniform
        // output resolution.
        Some(d) => FfmpegCommand::new(MANIFEST_FILE, OUTPUT_FILE)
            .concat_manifest()
            .video_filter(scale_crop_filter(d.width, d.height))
            .encode_with(encoding),
        // No transform requested: stream copy for fidelity and speed.
        None => FfmpegCommand::new(MANIFEST_FILE, OUTPUT_FILE)
            .concat_manifest()
            .stream_copy(),
    };

    RenderPlan {
        extract,
        manifest: Some(manifest),
        concat: Some(concat),
        scratch,
    }
}

async fn cleanup_scratch(lease: &EngineLease, names: &[String]) {
    for name in names {
        if let Err(e) = lease.remove_file(name).await {
            // Cleanup failures never mask the primary result.
            warn!(file = %name, error = %e, "Scratch cleanup failed");
        }
    }
}
