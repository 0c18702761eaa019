//! Highlight-finding API client.
//!
//! Sends the merged transcript to an LLM-backed service and gets back
//! the time ranges worth clipping. Ranges are passed through as-is;
//! the renderer validates them at the point of use.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use hclip_models::HighlightRange;

use crate::error::{ClientError, ClientResult};

/// Highlight-finding API client.
pub struct HighlightClient {
    base_url: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct HighlightRequest<'a> {
    transcript: &'a str,
    prompt: &'a str,
    video_duration: f64,
}

#[derive(Debug, Deserialize)]
struct HighlightResponse {
    highlights: Vec<HighlightRange>,
}

impl HighlightClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Ask the service for interesting ranges in the transcript.
    pub async fn find_highlights(
        &self,
        transcript: &str,
        prompt: &str,
        video_duration: f64,
    ) -> ClientResult<Vec<HighlightRange>> {
        let url = format!("{}/v1/highlights", self.base_url);
        let request = HighlightRequest {
            transcript,
            prompt,
            video_duration,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::api(status, body));
        }

        let parsed: HighlightResponse = response
            .json()
            .await
            .map_err(|e| ClientError::invalid_response(e.to_string()))?;

        if parsed.highlights.is_empty() {
            warn!("Highlight service returned no ranges");
        } else {
            info!(count = parsed.highlights.len(), "Highlights received");
        }
        Ok(parsed.highlights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_find_highlights() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/highlights"))
            .and(body_partial_json(json!({"prompt": "find the best bits"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "highlights": [
                    {"start": 30.0, "end": 62.5, "description": "the reveal"},
                    {"start": 120.0, "end": 150.0}
                ]
            })))
            .mount(&server)
            .await;

        let client = HighlightClient::new(server.uri(), "test-key");
        let ranges = client
            .find_highlights("a transcript", "find the best bits", 300.0)
            .await
            .unwrap();
        assert_eq!(ranges.len(), 2);
        assert!((ranges[0].end - 62.5).abs() < 1e-9);
        assert_eq!(ranges[0].description.as_deref(), Some("the reveal"));
        assert!(ranges[1].description.is_none());
    }

    #[tokio::test]
    async fn test_server_error_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/highlights"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
            .mount(&server)
            .await;

        let client = HighlightClient::new(server.uri(), "test-key");
        let err = client
            .find_highlights("t", "p", 10.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 500, .. }));
    }
}
