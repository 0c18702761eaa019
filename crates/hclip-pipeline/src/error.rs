//! Pipeline error types.

use thiserror::Error;

/// Errors from the end-to-end highlight pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Engine error: {0}")]
    Engine(#[from] hclip_engine::EngineError),

    #[error("Render error: {0}")]
    Render(#[from] hclip_engine::RenderError),

    #[error("API client error: {0}")]
    Client(#[from] hclip_client::ClientError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
