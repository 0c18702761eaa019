//! Transcription API client.
//!
//! Uploads one audio chunk per request as multipart form data. The
//! service rejects payloads over 15MB, so oversized chunks are refused
//! here before any bytes leave the process; splitting is the caller's
//! job.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use hclip_models::TranscriptSegment;

use crate::error::{ClientError, ClientResult};

/// Hard upload limit enforced by the transcription service.
pub const MAX_AUDIO_BYTES: usize = 15 * 1024 * 1024;

/// Transcription API client.
pub struct TranscriptionClient {
    base_url: String,
    api_key: String,
    client: Client,
}

/// One transcribed chunk, timestamps local to the chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
    /// Timestamped segments, absent when the service ran without them.
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

impl TranscriptionClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Transcribe one audio chunk.
    ///
    /// No internal retry; callers decide whether a failed chunk is
    /// worth a second attempt.
    pub async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: &str,
    ) -> ClientResult<TranscriptionResponse> {
        if audio.len() > MAX_AUDIO_BYTES {
            return Err(ClientError::PayloadTooLarge {
                size: audio.len(),
                limit: MAX_AUDIO_BYTES,
            });
        }

        let url = format!("{}/v1/audio/transcriptions", self.base_url);
        debug!(bytes = audio.len(), file_name, "Uploading audio chunk");

        let part = Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str("audio/mpeg")?;
        let form = Form::new()
            .part("file", part)
            .text("response_format", "verbose_json");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::api(status, body));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ClientError::invalid_response(e.to_string()))?;

        info!(
            file_name,
            segments = parsed.segments.len(),
            "Chunk transcribed"
        );
        Ok(parsed)
    }
}
