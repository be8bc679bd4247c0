//! OpenAI Whisper transcription implementation.

use super::{RawSegment, RawTranscription, Transcriber};
use crate::audio::{extract_audio, probe_duration, split_audio};
use crate::config::TranscriptionSettings;
use crate::error::{Result, SpolError};
use crate::openai::create_client;
use async_openai::types::{AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Transcription of one audio chunk, timestamps relative to the chunk.
#[derive(Debug, Default)]
struct ChunkTranscript {
    segments: Vec<RawSegment>,
    duration: f64,
    language: Option<String>,
    text: String,
}

/// OpenAI Whisper-based transcriber.
///
/// Extracts the audio track with ffmpeg, splits long audio, and sends each
/// piece to the transcription API with bounded concurrency.
pub struct WhisperTranscriber {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    language: Option<String>,
    chunk_duration_seconds: u32,
    max_concurrent_chunks: usize,
    max_duration_seconds: u32,
    temp_dir: PathBuf,
}

impl WhisperTranscriber {
    /// Create a new Whisper transcriber from settings.
    pub fn with_config(settings: &TranscriptionSettings, temp_dir: &Path) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: settings.model.clone(),
            language: settings.language.clone(),
            chunk_duration_seconds: settings.chunk_duration_seconds,
            max_concurrent_chunks: settings.max_concurrent_chunks.max(1),
            max_duration_seconds: settings.max_duration_seconds,
            temp_dir: temp_dir.to_path_buf(),
        })
    }

    /// Transcribe a single audio file (no splitting).
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe_single(&self, audio_path: &Path) -> Result<ChunkTranscript> {
        debug!("Transcribing audio file");

        let file_bytes = tokio::fs::read(audio_path).await?;

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(async_openai::types::AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.mp3")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::VerboseJson);

        if let Some(lang) = &self.language {
            request_builder.language(lang);
        }

        let request = request_builder
            .build()
            .map_err(|e| SpolError::Transcription(format!("Failed to build request: {}", e)))?;

        let body = self
            .client
            .audio()
            .transcribe_raw(request)
            .await
            .map_err(|e| SpolError::Transcription(format!("Whisper API error: {}", e)))?;

        let chunk = parse_verbose_json(&body)?;
        debug!("Transcribed {} segments", chunk.segments.len());
        Ok(chunk)
    }

    /// Transcribe an audio file, splitting if necessary.
    #[instrument(skip(self, work_dir), fields(audio_path = %audio_path.display()))]
    async fn transcribe_with_splitting(
        &self,
        audio_path: &Path,
        work_dir: &Path,
        duration: f64,
    ) -> Result<RawTranscription> {
        let chunks =
            split_audio(audio_path, work_dir, duration, self.chunk_duration_seconds).await?;

        if chunks.len() == 1 {
            let chunk = self.transcribe_single(audio_path).await?;
            return Ok(merge_chunks(vec![(0, 0.0, chunk)]));
        }

        let chunk_count = chunks.len();
        info!("Processing {} audio chunks with {}", chunk_count, self.model);

        // Process chunks in parallel with concurrency limit, fail fast on error
        let mut results = Vec::with_capacity(chunk_count);

        let mut stream = stream::iter(chunks.into_iter().enumerate())
            .map(|(idx, (chunk_path, time_offset))| async move {
                let result = self.transcribe_single(&chunk_path).await;
                (idx, time_offset, result)
            })
            .buffer_unordered(self.max_concurrent_chunks);

        while let Some((idx, time_offset, result)) = stream.next().await {
            match result {
                Ok(chunk) => results.push((idx, time_offset, chunk)),
                Err(e) => {
                    return Err(SpolError::Transcription(format!(
                        "Chunk {} at {:.0}s failed: {}",
                        idx, time_offset, e
                    )));
                }
            }
        }

        Ok(merge_chunks(results))
    }
}

/// Parse a verbose-JSON response body.
///
/// Records are read leniently so one odd segment does not lose the chunk;
/// the segment extractor drops whatever is unusable later.
fn parse_verbose_json(body: &[u8]) -> Result<ChunkTranscript> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| SpolError::Transcription(format!("Unreadable Whisper response: {}", e)))?;
    let raw = RawTranscription::from_json_value(&value);

    Ok(ChunkTranscript {
        duration: raw.duration_seconds(),
        segments: raw.segments.unwrap_or_default(),
        language: raw.language,
        text: raw.text,
    })
}

/// Stitch chunk transcripts back into one transcription.
///
/// Chunks are ordered by index, timestamps shifted by the chunk offset, and
/// segment ids renumbered so they stay unique across chunks.
fn merge_chunks(mut results: Vec<(usize, f64, ChunkTranscript)>) -> RawTranscription {
    results.sort_by_key(|(idx, _, _)| *idx);

    let mut all_segments = Vec::new();
    let mut texts = Vec::new();
    let mut language = None;
    let mut duration = 0.0f64;
    let mut id_base = 0i64;

    for (_, time_offset, chunk) in results {
        let span = chunk
            .segments
            .iter()
            .filter_map(|s| s.id)
            .max()
            .map(|max_id| max_id + 1)
            .unwrap_or(chunk.segments.len() as i64);

        for mut segment in chunk.segments {
            segment.id = segment.id.map(|id| id + id_base);
            segment.start = segment.start.map(|s| s + time_offset);
            segment.end = segment.end.map(|e| e + time_offset);
            all_segments.push(segment);
        }

        id_base += span;
        duration = duration.max(time_offset + chunk.duration);
        if language.is_none() {
            language = chunk.language;
        }
        let text = chunk.text.trim().to_string();
        if !text.is_empty() {
            texts.push(text);
        }
    }

    RawTranscription {
        segments: Some(all_segments),
        duration: Some(duration),
        language,
        text: texts.join(" "),
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[instrument(skip(self), fields(media_path = %media_path.display()))]
    async fn transcribe(&self, media_path: &Path) -> Result<RawTranscription> {
        std::fs::create_dir_all(&self.temp_dir)?;
        let work_dir = tempfile::tempdir_in(&self.temp_dir)?;

        let audio_path = extract_audio(media_path, work_dir.path(), "audio").await?;

        let duration = probe_duration(&audio_path).await?;
        if duration > self.max_duration_seconds as f64 {
            return Err(SpolError::Transcription(format!(
                "Media duration ({:.0} seconds) exceeds maximum ({} seconds)",
                duration, self.max_duration_seconds
            )));
        }

        info!("Transcribing {:.1}s of audio", duration);
        let transcription = self
            .transcribe_with_splitting(&audio_path, work_dir.path(), duration)
            .await?;

        // Clean up extracted audio and chunks
        drop(work_dir);

        Ok(transcription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(ids: &[i64], duration: f64, text: &str) -> ChunkTranscript {
        ChunkTranscript {
            segments: ids
                .iter()
                .map(|&id| RawSegment::new(id, id as f64, id as f64 + 1.0, format!("s{}", id)))
                .collect(),
            duration,
            language: Some("en".to_string()),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_parse_verbose_json_keeps_odd_records() {
        let body = br#"{
            "task": "transcribe",
            "language": "english",
            "duration": 9.5,
            "text": "Hello there. General Kenobi.",
            "segments": [
                {"id": 0, "seek": 0, "start": 0.0, "end": 4.0, "text": " Hello there."},
                {"id": 1, "seek": 0, "start": 4.0, "text": 5}
            ]
        }"#;

        let chunk = parse_verbose_json(body).unwrap();
        assert_eq!(chunk.duration, 9.5);
        assert_eq!(chunk.language.as_deref(), Some("english"));
        assert_eq!(chunk.segments.len(), 2);
        assert_eq!(chunk.segments[0], RawSegment::new(0, 0.0, 4.0, " Hello there."));
        assert_eq!(chunk.segments[1], RawSegment::default());
    }

    #[test]
    fn test_parse_verbose_json_rejects_garbage() {
        let result = parse_verbose_json(b"<html>502</html>");
        assert!(matches!(result, Err(SpolError::Transcription(_))));
    }

    #[test]
    fn test_merge_renumbers_ids_and_offsets_times() {
        let merged = merge_chunks(vec![
            (1, 600.0, chunk(&[0, 1], 300.0, "second")),
            (0, 0.0, chunk(&[0, 1, 2], 600.0, "first")),
        ]);

        let segments = merged.segments.unwrap();
        let ids: Vec<i64> = segments.iter().filter_map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);

        assert_eq!(segments[3].start, Some(600.0));
        assert_eq!(segments[4].end, Some(602.0));
        assert_eq!(merged.duration, Some(900.0));
        assert_eq!(merged.text, "first second");
        assert_eq!(merged.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_merge_single_chunk_untouched() {
        let merged = merge_chunks(vec![(0, 0.0, chunk(&[0, 1], 5.0, "hi"))]);
        let segments = merged.segments.unwrap();
        assert_eq!(segments[0], RawSegment::new(0, 0.0, 1.0, "s0"));
        assert_eq!(merged.duration, Some(5.0));
    }
}
