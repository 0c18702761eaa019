//! Transcript models.

use serde::{Deserialize, Serialize};

/// A timestamped span of transcribed speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds (global timeline once merged)
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Return a copy shifted forward by `offset` seconds.
    pub fn offset_by(&self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
            text: self.text.clone(),
        }
    }
}

/// A complete transcript on the global video timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    /// Full transcript text
    pub text: String,
    /// Timestamped segments in chronological order
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// End time of the last timestamped segment, 0 when none exist.
    pub fn duration(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.end)
            .fold(0.0, f64::max)
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_by() {
        let seg = TranscriptSegment::new(1.0, 2.5, "hello");
        let shifted = seg.offset_by(10.0);
        assert!((shifted.start - 11.0).abs() < 1e-9);
        assert!((shifted.end - 12.5).abs() < 1e-9);
        assert_eq!(shifted.text, "hello");
    }

    #[test]
    fn test_transcript_duration() {
        let t = Transcript {
            text: "a b".to_string(),
            segments: vec![
                TranscriptSegment::new(0.0, 2.0, "a"),
                TranscriptSegment::new(2.0, 5.5, "b"),
            ],
        };
        assert!((t.duration() - 5.5).abs() < 1e-9);
        assert!((Transcript::default().duration()).abs() < 1e-9);
    }
}
