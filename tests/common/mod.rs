//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use spol::config::{EmbeddingProvider, Settings};
use spol::embedding::{Embedder, HashingEmbedder};
use spol::pipeline::{Pipeline, UploadOutcome};
use spol::search::QueryResult;
use spol::summary::Summarizer;
use spol::transcription::{RawSegment, RawTranscription, Transcriber};
use spol::{Result, SpolError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

pub const DIMENSIONS: usize = 256;

/// What the fake transcriber does for a given upload name.
#[derive(Clone)]
pub enum Script {
    Segments(RawTranscription),
    Fail(String),
    /// Wait until notified, then return the transcription.
    Gated(Arc<Notify>, RawTranscription),
}

/// Transcriber that looks up a canned answer by the uploaded filename.
#[derive(Default)]
pub struct ScriptedTranscriber {
    scripts: HashMap<String, Script>,
}

impl ScriptedTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filename: &str, script: Script) -> Self {
        self.scripts.insert(filename.to_string(), script);
        self
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, media_path: &Path) -> Result<RawTranscription> {
        let name = media_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        // Stored uploads are "<uuid>-<filename>".
        let script = self
            .scripts
            .iter()
            .find(|(key, _)| name == key.as_str() || name.ends_with(&format!("-{}", key)))
            .map(|(_, script)| script.clone())
            .ok_or_else(|| SpolError::Transcription(format!("unknown media {}", name)))?;

        match script {
            Script::Segments(raw) => Ok(raw),
            Script::Fail(msg) => Err(SpolError::Transcription(msg)),
            Script::Gated(gate, raw) => {
                gate.notified().await;
                Ok(raw)
            }
        }
    }
}

/// Local embedder whose backend can be switched off mid-test.
pub struct SwitchableEmbedder {
    inner: HashingEmbedder,
    down: AtomicBool,
}

impl SwitchableEmbedder {
    pub fn new() -> Self {
        Self {
            inner: HashingEmbedder::new(DIMENSIONS),
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(SpolError::Embedding("embedding backend unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for SwitchableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.check()?;
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.check()?;
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// Summarizer that echoes its inputs.
pub struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, query: &str, results: &[QueryResult]) -> Result<String> {
        Ok(format!("{} -> {} segments", query, results.len()))
    }

    async fn answer(&self, question: &str, context: &str) -> Result<String> {
        Ok(format!("{} | {}", question, context))
    }
}

/// Summarizer whose backend is always down.
pub struct DownSummarizer;

#[async_trait]
impl Summarizer for DownSummarizer {
    async fn summarize(&self, _query: &str, _results: &[QueryResult]) -> Result<String> {
        Err(SpolError::Summarization("backend unavailable".to_string()))
    }

    async fn answer(&self, _question: &str, _context: &str) -> Result<String> {
        Err(SpolError::Summarization("backend unavailable".to_string()))
    }
}

/// Settings rooted in a scratch directory, with local embeddings.
pub fn test_settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    let root = dir.path();
    settings.general.data_dir = root.join("data").display().to_string();
    settings.general.upload_dir = root.join("uploads").display().to_string();
    settings.general.temp_dir = root.join("tmp").display().to_string();
    settings.embedding.provider = EmbeddingProvider::Hashing;
    settings.embedding.dimensions = DIMENSIONS as u32;
    settings.embedding.batch_size = 2;
    settings.summary.enabled = false;
    settings
}

pub fn build_pipeline(
    settings: Settings,
    transcriber: ScriptedTranscriber,
    summarizer: Option<Arc<dyn Summarizer>>,
) -> Arc<Pipeline> {
    build_pipeline_with_embedder(
        settings,
        transcriber,
        Arc::new(HashingEmbedder::new(DIMENSIONS)),
        summarizer,
    )
}

pub fn build_pipeline_with_embedder(
    settings: Settings,
    transcriber: ScriptedTranscriber,
    embedder: Arc<dyn Embedder>,
    summarizer: Option<Arc<dyn Summarizer>>,
) -> Arc<Pipeline> {
    Arc::new(
        Pipeline::with_components(settings, Arc::new(transcriber), embedder, summarizer)
            .expect("pipeline"),
    )
}

/// Store a fake upload and process it, as the upload endpoint does.
pub async fn upload(pipeline: &Arc<Pipeline>, filename: &str) -> Result<UploadOutcome> {
    let permit = pipeline.try_begin_upload()?;
    let pending = pipeline.prepare_upload(filename)?;
    tokio::fs::write(&pending.path, b"not really a video").await?;
    pipeline.process_upload(permit, pending).await
}

pub fn transcription(segments: &[(i64, f64, f64, &str)]) -> RawTranscription {
    let records = segments
        .iter()
        .map(|&(id, start, end, text)| RawSegment::new(id, start, end, text))
        .collect();
    RawTranscription {
        duration: segments.last().map(|s| s.2),
        ..RawTranscription::from_segments(records)
    }
}

pub fn cooking() -> RawTranscription {
    transcription(&[
        (0, 0.0, 4.0, " Welcome to the kitchen."),
        (1, 4.0, 9.5, " First we chop the onions finely."),
        (2, 9.5, 15.0, " Then fry them in butter until golden."),
        (3, 15.0, 125.7, " Season with salt and pepper."),
    ])
}

pub fn astronomy() -> RawTranscription {
    transcription(&[
        (0, 0.0, 6.0, " Tonight we look at the rings of Saturn."),
        (1, 6.0, 12.0, " Jupiter has a great red spot."),
    ])
}
