//! Media metadata probing via ffprobe.

use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::session::EngineSession;

/// Metadata loading never hangs; it fails with a timeout error instead.
pub const PROBE_TIMEOUT_SECS: u64 = 15;

/// Probed media information.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels (0 for audio-only input)
    pub width: u32,
    /// Height in pixels (0 for audio-only input)
    pub height: u32,
    /// File size in bytes
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
}

/// Probe a file inside the session's scratch storage.
pub async fn probe_media(session: &EngineSession, name: &str) -> EngineResult<MediaInfo> {
    let path = session.path_of(name);
    debug!("Probing media: {}", path.display());

    let run = Command::new(session.ffprobe())
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(&path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output();

    let output = tokio::time::timeout(Duration::from_secs(PROBE_TIMEOUT_SECS), run)
        .await
        .map_err(|_| EngineError::Timeout(PROBE_TIMEOUT_SECS))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(EngineError::probe_failed(stderr));
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let video = probe.streams.iter().find(|s| s.codec_type == "video");

    Ok(MediaInfo {
        duration,
        width: video.and_then(|s| s.width).unwrap_or(0),
        height: video.and_then(|s| s.height).unwrap_or(0),
        size,
    })
}
