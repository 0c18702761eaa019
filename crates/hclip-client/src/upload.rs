//! Upload client for collaborators that want a fetchable URL.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Uploads media to temporary storage and returns its URL.
pub struct UploadClient {
    base_url: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

impl UploadClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Upload bytes, returning the URL where they can be fetched.
    pub async fn upload(
        &self,
        data: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> ClientResult<Url> {
        let url = format!("{}/v1/uploads", self.base_url);
        let size = data.len();

        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = Form::new().part("file", part);

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

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| ClientError::invalid_response(e.to_string()))?;

        let fetch_url = Url::parse(&parsed.url)?;
        info!(bytes = size, url = %fetch_url, "Upload complete");
        Ok(fetch_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_upload_returns_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/uploads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"url": "https://cdn.example.com/clips/abc123.mp4"}),
            ))
            .mount(&server)
            .await;

        let client = UploadClient::new(server.uri(), "test-key");
        let url = client
            .upload(vec![0u8; 32], "clip.mp4", "video/mp4")
            .await
            .unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/clips/abc123.mp4");
    }

    #[tokio::test]
    async fn test_malformed_url_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/uploads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "not a url"})))
            .mount(&server)
            .await;

        let client = UploadClient::new(server.uri(), "test-key");
        let err = client
            .upload(vec![0u8; 32], "clip.mp4", "video/mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl(_)));
    }
}
