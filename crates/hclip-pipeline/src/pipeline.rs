//! End-to-end highlight pipeline.
//!
//! Orchestrates: probe → audio extraction → chunked transcription →
//! highlight finding → queued per-segment rendering. Every engine
//! touch goes through the shared [`EngineManager`], so only one
//! FFmpeg session exists at a time regardless of how many clips get
//! queued.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use hclip_client::{HighlightClient, TranscriptionClient, MAX_AUDIO_BYTES};
use hclip_engine::{
    merge_transcripts, probe_media, AudioSplitter, ChunkTranscript, EngineManager,
    SegmentRenderer,
};
use hclip_models::{EncodingConfig, ProgressSender, TargetPlatform, Transcript, VideoSegment};
use hclip_queue::{BatchTracker, RenderQueue, RenderTask};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;

/// Scratch name used for the duration probe.
const PROBE_FILE: &str = "probe_input.mp4";

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Target platform for every produced clip; `None` keeps the
    /// source resolution.
    pub platform: Option<TargetPlatform>,
    /// Override the configured highlight prompt for this run.
    pub prompt: Option<String>,
}

/// One clip's outcome. Failed clips carry the error text instead of
/// bytes; a failure never withholds the sibling clips.
#[derive(Debug)]
pub struct RenderedClip {
    /// Position in the highlight list (also the render priority)
    pub index: usize,
    /// The segment that was rendered
    pub segment: VideoSegment,
    /// Encoded clip bytes, or why this clip failed
    pub output: Result<Vec<u8>, String>,
}

/// The assembled pipeline.
pub struct HighlightPipeline {
    config: PipelineConfig,
    manager: Arc<EngineManager>,
    queue: RenderQueue,
    transcription: TranscriptionClient,
    highlight: HighlightClient,
}

impl HighlightPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let manager = Arc::new(EngineManager::new(config.session_policy.clone()));
        let queue = RenderQueue::new(config.queue_settings.clone());
        let transcription = TranscriptionClient::new(
            config.transcription_url.clone(),
            config.transcription_api_key.clone(),
        );
        let highlight = HighlightClient::new(
            config.highlight_url.clone(),
            config.highlight_api_key.clone(),
        );
        Self {
            config,
            manager,
            queue,
            transcription,
            highlight,
        }
    }

    /// Shared engine manager, for callers that need direct access.
    pub fn manager(&self) -> Arc<EngineManager> {
        Arc::clone(&self.manager)
    }

    /// Run the full pipeline over one video.
    pub async fn process(
        &self,
        video: Vec<u8>,
        options: PipelineOptions,
        progress: ProgressSender,
    ) -> PipelineResult<Vec<RenderedClip>> {
        let duration = self.probe_duration(&video).await?;
        info!(duration_secs = duration, "Source video probed");

        let transcript = self.transcribe(&video).await?;
        if transcript.is_empty() {
            warn!("Transcript is empty, no highlights to find");
            return Ok(Vec::new());
        }

        let prompt = options.prompt.as_deref().unwrap_or(&self.config.prompt);
        let highlights = self
            .highlight
            .find_highlights(&transcript.text, prompt, duration)
            .await?;
        if highlights.is_empty() {
            return Ok(Vec::new());
        }
        info!(count = highlights.len(), "Rendering highlight clips");

        let segments: Vec<VideoSegment> = highlights
            .into_iter()
            .map(|h| h.into_segment(options.platform))
            .collect();
        self.render_all(video, segments, progress).await
    }

    /// Extract audio, split under the upload limit, transcribe each
    /// chunk in order, and merge onto the global timeline.
    pub async fn transcribe(&self, video: &[u8]) -> PipelineResult<Transcript> {
        let splitter = AudioSplitter::new(Arc::clone(&self.manager));
        let audio = splitter.extract_audio(video).await?;
        let split = splitter.split(&audio, MAX_AUDIO_BYTES).await?;
        info!(chunks = split.chunks.len(), "Audio split for transcription");

        let mut pieces = Vec::with_capacity(split.chunks.len());
        for chunk in &split.chunks {
            let name = format!("chunk_{:03}.mp3", chunk.index);
            let response = self.transcription.transcribe(chunk.data.clone(), &name).await?;
            pieces.push(ChunkTranscript {
                text: response.text,
                segments: response.segments,
            });
        }

        Ok(merge_transcripts(&pieces, split.chunk_seconds))
    }

    /// Queue one render task per segment and wait for all of them.
    ///
    /// Task priority is the segment index, so clips finish in
    /// highlight order even if enqueueing races the worker.
    async fn render_all(
        &self,
        video: Vec<u8>,
        segments: Vec<VideoSegment>,
        progress: ProgressSender,
    ) -> PipelineResult<Vec<RenderedClip>> {
        let source = Arc::new(video);
        let renderer = Arc::new(SegmentRenderer::new(
            Arc::clone(&self.manager),
            EncodingConfig::default(),
        ));
        let tracker = BatchTracker::new(segments.len());
        let slots: Arc<Mutex<Vec<Option<Result<Vec<u8>, String>>>>> =
            Arc::new(Mutex::new(vec![None; segments.len()]));

        for (index, segment) in segments.iter().enumerate() {
            let source = Arc::clone(&source);
            let renderer = Arc::clone(&renderer);
            let slots_in = Arc::clone(&slots);
            let segment_in = segment.clone();
            let progress_in = progress.clone();
            let dims = segment.platform.and_then(|p| p.dimensions());

            let task = RenderTask::new(index as u32, move || {
                let source = Arc::clone(&source);
                let renderer = Arc::clone(&renderer);
                let slots = Arc::clone(&slots_in);
                let segment = segment_in.clone();
                let progress = progress_in.clone();
                async move {
                    let output = renderer
                        .render(&source, std::slice::from_ref(&segment), dims, &progress)
                        .await?;
                    slots.lock().expect("result lock poisoned")[index] = Some(Ok(output));
                    Ok(())
                }
            });

            let done_handle = tracker.handle();
            let fail_handle = tracker.handle();
            let slots_fail = Arc::clone(&slots);
            let task = task
                .on_success(move || done_handle.task_done())
                .on_failure(move |e| {
                    slots_fail.lock().expect("result lock poisoned")[index] =
                        Some(Err(e.to_string()));
                    fail_handle.task_failed();
                });
            self.queue.enqueue(task);
        }

        let outcome = tracker.wait().await;
        info!(
            completed = outcome.completed,
            failed = outcome.failed,
            "Render batch settled"
        );

        let mut slots = slots.lock().expect("result lock poisoned");
        let clips = segments
            .into_iter()
            .enumerate()
            .map(|(index, segment)| RenderedClip {
                index,
                segment,
                output: slots[index]
                    .take()
                    .unwrap_or_else(|| Err("render task produced no result".to_string())),
            })
            .collect();
        Ok(clips)
    }

    /// Probe the source's duration through a short-lived engine use.
    async fn probe_duration(&self, video: &[u8]) -> PipelineResult<f64> {
        let lease = self.manager.acquire().await?;
        let result = async {
            lease.write_input(PROBE_FILE, video).await?;
            let info = probe_media(&lease, PROBE_FILE).await;
            lease.remove_file(PROBE_FILE).await?;
            info
        }
        .await?;
        Ok(result.duration)
    }
}
