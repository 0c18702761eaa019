//! Highlight pipeline binary.
//!
//! One-shot run: reads a video file, produces one clip file per
//! highlight next to it.

use std::path::PathBuf;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hclip_models::progress_channel;
use hclip_pipeline::{HighlightPipeline, PipelineConfig, PipelineOptions};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("hclip=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    if let Err(e) = run().await {
        error!("Pipeline failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let input: PathBuf = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: hclip-pipeline <video-file>"))?
        .into();

    let config = PipelineConfig::from_env()?;
    let options = PipelineOptions {
        platform: std::env::var("HCLIP_PLATFORM")
            .ok()
            .and_then(|v| parse_platform(&v)),
        prompt: None,
    };

    info!(input = %input.display(), "Starting highlight pipeline");
    let video = tokio::fs::read(&input).await?;

    let (progress_tx, mut progress_rx) = progress_channel();
    let progress_task = tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            match &event.detail {
                Some(detail) => {
                    info!(phase = %event.phase, percent = event.percent, detail, "Progress")
                }
                None => info!(phase = %event.phase, percent = event.percent, "Progress"),
            }
        }
    });

    let pipeline = HighlightPipeline::new(config);
    let clips = pipeline.process(video, options, progress_tx).await?;
    progress_task.await.ok();

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "clip".to_string());
    let dir = input.parent().map(PathBuf::from).unwrap_or_default();

    let mut written = 0usize;
    for clip in &clips {
        match &clip.output {
            Ok(bytes) => {
                let path = dir.join(format!("{}_clip_{:03}.mp4", stem, clip.index));
                tokio::fs::write(&path, bytes).await?;
                info!(path = %path.display(), bytes = bytes.len(), "Clip written");
                written += 1;
            }
            Err(reason) => {
                warn!(index = clip.index, reason, "Clip failed to render");
            }
        }
    }

    info!(written, total = clips.len(), "Pipeline complete");
    Ok(())
}

/// Parse a platform name the same way its serde form spells it.
fn parse_platform(value: &str) -> Option<hclip_models::TargetPlatform> {
    match value.to_lowercase().as_str() {
        "youtube" => Some(hclip_models::TargetPlatform::Youtube),
        "tiktok" => Some(hclip_models::TargetPlatform::Tiktok),
        "instagram" => Some(hclip_models::TargetPlatform::Instagram),
        "original" => Some(hclip_models::TargetPlatform::Original),
        _ => None,
    }
}
