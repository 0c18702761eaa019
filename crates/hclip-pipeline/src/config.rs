//! Pipeline configuration.

use std::time::Duration;

use hclip_engine::SessionPolicy;
use hclip_queue::QueueSettings;

use crate::error::{PipelineError, PipelineResult};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base URL of the transcription API
    pub transcription_url: String,
    /// API key for the transcription API
    pub transcription_api_key: String,
    /// Base URL of the highlight-finding API
    pub highlight_url: String,
    /// API key for the highlight-finding API
    pub highlight_api_key: String,
    /// Base prompt sent with each highlight request
    pub prompt: String,
    /// Engine session lifecycle thresholds
    pub session_policy: SessionPolicy,
    /// Render queue tuning
    pub queue_settings: QueueSettings,
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// API keys are required; everything else has working defaults.
    pub fn from_env() -> PipelineResult<Self> {
        let transcription_api_key = std::env::var("HCLIP_TRANSCRIPTION_API_KEY")
            .map_err(|_| PipelineError::config("HCLIP_TRANSCRIPTION_API_KEY not set"))?;
        let highlight_api_key = std::env::var("HCLIP_HIGHLIGHT_API_KEY")
            .map_err(|_| PipelineError::config("HCLIP_HIGHLIGHT_API_KEY not set"))?;

        Ok(Self {
            transcription_url: std::env::var("HCLIP_TRANSCRIPTION_URL")
                .unwrap_or_else(|_| "https://api.transcribe.example.com".to_string()),
            transcription_api_key,
            highlight_url: std::env::var("HCLIP_HIGHLIGHT_URL")
                .unwrap_or_else(|_| "https://api.highlights.example.com".to_string()),
            highlight_api_key,
            prompt: std::env::var("HCLIP_PROMPT").unwrap_or_else(|_| {
                "Find the most engaging, self-contained moments in this transcript."
                    .to_string()
            }),
            session_policy: SessionPolicy::from_env(),
            queue_settings: QueueSettings {
                retry_delay: Duration::from_millis(
                    std::env::var("HCLIP_QUEUE_RETRY_MS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(500),
                ),
                task_gap: Duration::from_millis(
                    std::env::var("HCLIP_QUEUE_GAP_MS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(100),
                ),
            },
        })
    }
}
