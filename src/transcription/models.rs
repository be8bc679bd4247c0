//! Data models for transcription output.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A segment-like record as produced by a transcription service.
///
/// Every field is optional: services are allowed to omit things, and the
/// segment extractor decides which records are usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub id: Option<i64>,
    /// Start time in seconds.
    pub start: Option<f64>,
    /// End time in seconds.
    pub end: Option<f64>,
    pub text: Option<String>,
}

impl RawSegment {
    /// Convenience constructor for a fully populated record.
    pub fn new(id: i64, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            start: Some(start),
            end: Some(end),
            text: Some(text.into()),
        }
    }
}

/// Raw output of a transcription service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTranscription {
    /// Segment records, in transcription order. `None` when the service returned none.
    pub segments: Option<Vec<RawSegment>>,
    /// Total duration in seconds, if reported.
    pub duration: Option<f64>,
    /// Detected language, if reported.
    pub language: Option<String>,
    /// Full transcript text.
    #[serde(default)]
    pub text: String,
}

impl RawTranscription {
    /// Build a transcription from records alone.
    pub fn from_segments(segments: Vec<RawSegment>) -> Self {
        Self {
            segments: Some(segments),
            ..Self::default()
        }
    }

    /// Parse Whisper-style JSON leniently.
    ///
    /// A segment entry that does not have the expected shape becomes an empty
    /// record instead of failing the whole document.
    pub fn from_json_value(value: &serde_json::Value) -> Self {
        let segments = value
            .get("segments")
            .and_then(|s| s.as_array())
            .map(|records| {
                records
                    .iter()
                    .map(|record| {
                        serde_json::from_value::<RawSegment>(record.clone()).unwrap_or_else(|e| {
                            warn!("Unreadable segment record: {}", e);
                            RawSegment::default()
                        })
                    })
                    .collect()
            });

        Self {
            segments,
            duration: value.get("duration").and_then(|d| d.as_f64()),
            language: value
                .get("language")
                .and_then(|l| l.as_str())
                .map(|l| l.to_string()),
            text: value
                .get("text")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Reported duration, falling back to the latest segment end.
    pub fn duration_seconds(&self) -> f64 {
        if let Some(duration) = self.duration.filter(|d| d.is_finite() && *d >= 0.0) {
            return duration;
        }

        self.segments
            .iter()
            .flatten()
            .filter_map(|s| s.end)
            .filter(|e| e.is_finite())
            .fold(0.0f64, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_json_parse() {
        let value = json!({
            "text": "hello there",
            "duration": 4.5,
            "language": "en",
            "segments": [
                {"id": 0, "start": 0.0, "end": 2.0, "text": "hello", "seek": 0},
                {"id": "one", "start": 2.0, "end": 4.0, "text": "there"}
            ]
        });

        let raw = RawTranscription::from_json_value(&value);
        let segments = raw.segments.as_ref().unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], RawSegment::new(0, 0.0, 2.0, "hello"));
        assert_eq!(segments[1], RawSegment::default());
        assert_eq!(raw.duration, Some(4.5));
        assert_eq!(raw.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_missing_segments_key() {
        let raw = RawTranscription::from_json_value(&json!({"text": "x"}));
        assert!(raw.segments.is_none());
    }

    #[test]
    fn test_duration_falls_back_to_last_end() {
        let raw = RawTranscription::from_segments(vec![
            RawSegment::new(0, 0.0, 3.0, "a"),
            RawSegment::new(1, 3.0, 7.25, "b"),
        ]);
        assert_eq!(raw.duration_seconds(), 7.25);

        assert_eq!(RawTranscription::default().duration_seconds(), 0.0);
    }
}
