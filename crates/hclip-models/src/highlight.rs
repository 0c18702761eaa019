//! Highlight ranges returned by the highlight-finding API.

use serde::{Deserialize, Serialize};

use crate::segment::{TargetPlatform, VideoSegment};

/// An interesting time range suggested by the highlight-finding API.
///
/// Ranges are not validated on arrival; the renderer rejects invalid
/// ones at the point of use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightRange {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Why this range is interesting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl HighlightRange {
    /// Convert into a renderable segment for the given platform.
    pub fn into_segment(self, platform: Option<TargetPlatform>) -> VideoSegment {
        VideoSegment {
            start: self.start,
            end: self.end,
            description: self.description,
            platform,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_segment() {
        let range = HighlightRange {
            start: 12.0,
            end: 34.0,
            description: Some("big reveal".to_string()),
        };
        let seg = range.into_segment(Some(TargetPlatform::Tiktok));
        assert!((seg.start - 12.0).abs() < 1e-9);
        assert_eq!(seg.platform, Some(TargetPlatform::Tiktok));
        assert_eq!(seg.description.as_deref(), Some("big reveal"));
    }

    #[test]
    fn test_deserialize_minimal() {
        let range: HighlightRange = serde_json::from_str(r#"{"start":1.0,"end":2.0}"#).unwrap();
        assert!(range.description.is_none());
    }
}
