//! Video segment and target platform models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output platform a clip is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPlatform {
    Youtube,
    Tiktok,
    Instagram,
    /// Keep the source resolution and aspect ratio.
    Original,
}

impl TargetPlatform {
    /// Output dimensions for the platform, `None` when the source
    /// format is preserved.
    pub fn dimensions(&self) -> Option<Dimensions> {
        match self {
            Self::Youtube => Some(Dimensions::new(1920, 1080)),
            Self::Tiktok | Self::Instagram => Some(Dimensions::new(1080, 1920)),
            Self::Original => None,
        }
    }
}

impl std::fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Youtube => "youtube",
            Self::Tiktok => "tiktok",
            Self::Instagram => "instagram",
            Self::Original => "original",
        };
        write!(f, "{}", s)
    }
}

/// Output dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A contiguous time range of the source video selected for a clip.
///
/// Immutable once handed to the pipeline for a given render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds (must be greater than start)
    pub end: f64,
    /// Human-readable description of the moment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Platform the clip is rendered for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<TargetPlatform>,
}

impl VideoSegment {
    /// Create a new segment.
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            description: None,
            platform: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the target platform.
    pub fn with_platform(mut self, platform: TargetPlatform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Segment duration in seconds.
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Validate the time range.
    pub fn validate(&self) -> Result<(), SegmentError> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(SegmentError::NonFinite);
        }
        if self.start < 0.0 {
            return Err(SegmentError::NegativeStart(self.start));
        }
        if self.end <= self.start {
            return Err(SegmentError::EmptyRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Segment validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentError {
    #[error("Segment timestamps must be finite numbers")]
    NonFinite,

    #[error("Segment start cannot be negative: {0}")]
    NegativeStart(f64),

    #[error("Segment end ({end}) must be after start ({start})")]
    EmptyRange { start: f64, end: f64 },
}
