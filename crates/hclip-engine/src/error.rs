//! Error types for engine operations.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from the embedded FFmpeg engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Engine load failed: {0}")]
    LoadFailed(String),

    #[error("Engine command failed: {message}")]
    ExecFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Engine produced no output file: {0}")]
    MissingOutput(String),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Metadata loading timed out after {0} seconds")]
    Timeout(u64),

    #[error("No engine session is loaded")]
    NoSession,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl EngineError {
    /// Create an exec failure error.
    pub fn exec_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ExecFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a load failure error.
    pub fn load_failed(message: impl Into<String>) -> Self {
        Self::LoadFailed(message.into())
    }

    /// Create a probe failure error.
    pub fn probe_failed(message: impl Into<String>) -> Self {
        Self::ProbeFailed(message.into())
    }
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors from segment extraction and assembly.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid segments: {0}")]
    InvalidSegments(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Render failed after {attempts} attempts: {source}")]
    AttemptsExhausted {
        attempts: u32,
        #[source]
        source: EngineError,
    },
}

impl RenderError {
    /// Create an invalid-segments error.
    pub fn invalid_segments(message: impl Into<String>) -> Self {
        Self::InvalidSegments(message.into())
    }

    /// True when retrying cannot help (input errors).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidSegments(_))
    }
}
