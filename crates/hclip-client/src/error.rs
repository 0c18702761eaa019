//! Client error types.

use thiserror::Error;

/// Errors from the external collaborator APIs.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Payload rejected locally before any request was made.
    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// The API answered 2xx but the body did not match the schema.
    #[error("Failed to parse API response: {0}")]
    InvalidResponse(String),

    /// The API returned a URL we could not parse.
    #[error("Invalid URL in API response: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ClientError {
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
