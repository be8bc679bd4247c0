//! Transcription module for Spol.
//!
//! Turns an uploaded video into raw, time-aligned transcript segments using
//! OpenAI Whisper, and formats extracted segments for export.

mod format;
mod models;
mod whisper;

pub use format::{format_transcript, OutputFormat, SegmentExport, TranscriptExport};
pub use models::{RawSegment, RawTranscription};
pub use whisper::WhisperTranscriber;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a media file and return raw segment records with timestamps.
    async fn transcribe(&self, media_path: &Path) -> Result<RawTranscription>;
}
