//! Transcript output formatting (JSON, SRT, VTT, plain text).

use crate::segments::{Segment, SegmentCollection, SegmentId};
use serde::Serialize;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Srt,
    Vtt,
    Text,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "srt" => Ok(OutputFormat::Srt),
            "vtt" | "webvtt" => Ok(OutputFormat::Vtt),
            "text" | "txt" => Ok(OutputFormat::Text),
            _ => Err(format!("Unknown format: {}. Use json, srt, vtt, or text.", s)),
        }
    }
}

/// JSON-serializable transcript for export.
#[derive(Debug, Serialize)]
pub struct TranscriptExport {
    pub duration_seconds: f64,
    pub segments: Vec<SegmentExport>,
}

#[derive(Debug, Serialize)]
pub struct SegmentExport {
    pub id: SegmentId,
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl From<&Segment> for SegmentExport {
    fn from(segment: &Segment) -> Self {
        Self {
            id: segment.id,
            text: segment.text.clone(),
            start_seconds: segment.start,
            end_seconds: segment.end,
        }
    }
}

impl TranscriptExport {
    pub fn new(segments: &SegmentCollection, duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            segments: segments.iter().map(SegmentExport::from).collect(),
        }
    }
}

/// Format segments for output. Timed formats follow transcription order.
pub fn format_transcript(
    segments: &SegmentCollection,
    duration_seconds: f64,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Json => format_json(segments, duration_seconds),
        OutputFormat::Srt => format_cues(segments, ',', ""),
        OutputFormat::Vtt => format_cues(segments, '.', "WEBVTT\n\n"),
        OutputFormat::Text => segments.full_transcript(),
    }
}

fn format_json(segments: &SegmentCollection, duration_seconds: f64) -> String {
    let export = TranscriptExport::new(segments, duration_seconds);
    serde_json::to_string_pretty(&export).unwrap_or_else(|_| "{}".to_string())
}

/// Numbered cues; SRT and VTT differ only in header and millisecond separator.
fn format_cues(segments: &SegmentCollection, separator: char, header: &str) -> String {
    let mut output = String::from(header);

    for (i, segment) in segments.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_timestamp(segment.start, separator),
            format_timestamp(segment.end, separator)
        ));
        output.push_str(segment.text.trim());
        output.push_str("\n\n");
    }

    output
}

/// Format a timestamp as `HH:MM:SS<sep>mmm`.
fn format_timestamp(seconds: f64, separator: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0) as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;

    format!("{:02}:{:02}:{:02}{}{:03}", hours, minutes, secs, separator, ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SegmentCollection {
        vec![
            Segment {
                id: 0,
                start: 0.0,
                end: 2.5,
                text: " Hello world.".to_string(),
            },
            Segment {
                id: 1,
                start: 2.5,
                end: 5.0,
                text: " This is a test.".to_string(),
            },
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_format_json() {
        let json = format_transcript(&sample(), 5.0, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["duration_seconds"], 5.0);
        assert_eq!(value["segments"][1]["id"], 1);
        assert_eq!(value["segments"][0]["text"], " Hello world.");
    }

    #[test]
    fn test_format_srt() {
        let srt = format_transcript(&sample(), 5.0, OutputFormat::Srt);
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,500\nHello world.\n\n"));
        assert!(srt.contains("2\n00:00:02,500 --> 00:00:05,000"));
    }

    #[test]
    fn test_format_vtt() {
        let vtt = format_transcript(&sample(), 5.0, OutputFormat::Vtt);
        assert!(vtt.starts_with("WEBVTT\n\n1\n"));
        assert!(vtt.contains("00:00:00.000 --> 00:00:02.500"));
    }

    #[test]
    fn test_format_text() {
        let text = format_transcript(&sample(), 5.0, OutputFormat::Text);
        assert_eq!(text, "[0:00 - 0:02]  Hello world.\n\n[0:02 - 0:05]  This is a test.\n\n");
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("SRT".parse::<OutputFormat>().unwrap(), OutputFormat::Srt);
        assert_eq!("webvtt".parse::<OutputFormat>().unwrap(), OutputFormat::Vtt);
        assert_eq!("txt".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("docx".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(format_timestamp(0.0, ','), "00:00:00,000");
        assert_eq!(format_timestamp(61.5, ','), "00:01:01,500");
        assert_eq!(format_timestamp(3661.123, '.'), "01:01:01.123");
    }
}
