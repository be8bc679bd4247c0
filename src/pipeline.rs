//! Pipeline coordination for Spol.
//!
//! Runs upload → transcription → segment extraction → embedding → session
//! publish, and serves queries against the published session.

use crate::config::{Prompts, Settings};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{Result, SpolError};
use crate::index::build_index;
use crate::search::{format_time, search, QueryResult};
use crate::segments::extract_segments;
use crate::session::{BuildPermit, Session, SessionStatus, SessionStore, VideoRef};
use crate::summary::{OpenAISummarizer, Summarizer};
use crate::web_context::DuckDuckGoContext;
use crate::transcription::{Transcriber, WhisperTranscriber};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// An upload that has a place on disk but has not been processed yet.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    /// Filename as sent by the client.
    pub filename: String,
    /// Unique name of the stored copy.
    pub stored_name: String,
    /// Where the stored copy lives.
    pub path: PathBuf,
}

/// Result of processing an upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub segments_count: usize,
    pub video_filename: String,
    /// Duration formatted as `m:ss`.
    pub duration: String,
    pub duration_seconds: f64,
    /// Name under which the video is served.
    pub stored_name: String,
    /// Version of the published session.
    pub version: u64,
}

/// The main pipeline for Spol.
pub struct Pipeline {
    settings: Settings,
    transcriber: Arc<dyn Transcriber>,
    embedder: Arc<dyn Embedder>,
    summarizer: Option<Arc<dyn Summarizer>>,
    sessions: SessionStore,
    upload_dir: PathBuf,
}

impl Pipeline {
    /// Create a pipeline with the collaborators named in settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let transcriber: Arc<dyn Transcriber> = Arc::new(WhisperTranscriber::with_config(
            &settings.transcription,
            &settings.temp_dir(),
        )?);

        let embedder = create_embedder(&settings.embedding)?;

        let summarizer: Option<Arc<dyn Summarizer>> = if settings.summary.enabled {
            let prompts = Prompts::load(
                settings.prompts.custom_dir.as_deref(),
                Some(&settings.prompts.variables),
            )?;
            let mut summarizer = OpenAISummarizer::new(&settings.summary, prompts)?;
            if settings.summary.web_context {
                summarizer = summarizer.with_web_context(Arc::new(DuckDuckGoContext::new()?));
            }
            Some(Arc::new(summarizer))
        } else {
            info!("Summaries disabled");
            None
        };

        Self::with_components(settings, transcriber, embedder, summarizer)
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        settings: Settings,
        transcriber: Arc<dyn Transcriber>,
        embedder: Arc<dyn Embedder>,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> Result<Self> {
        let upload_dir = settings.upload_dir();
        std::fs::create_dir_all(&upload_dir)?;

        Ok(Self {
            settings,
            transcriber,
            embedder,
            summarizer,
            sessions: SessionStore::new(),
            upload_dir,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn status(&self) -> SessionStatus {
        self.sessions.status()
    }

    /// Claim the build slot. Fails with [`SpolError::Busy`] if a build is running.
    pub fn try_begin_upload(&self) -> Result<BuildPermit> {
        self.sessions.try_begin_build()
    }

    /// Pick a storage location for an uploaded file.
    ///
    /// Directory components in the client's filename are dropped.
    pub fn prepare_upload(&self, filename: &str) -> Result<PendingUpload> {
        let clean = Path::new(filename.trim())
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
            .filter(|n| !n.is_empty())
            .ok_or(SpolError::EmptyFilename)?;

        let stored_name = format!("{}-{}", Uuid::new_v4().simple(), clean);
        let path = self.upload_dir.join(&stored_name);

        Ok(PendingUpload {
            filename: clean,
            stored_name,
            path,
        })
    }

    /// Process a stored upload and publish it as the new session.
    ///
    /// The work runs on its own task holding the permit, so it completes even
    /// if the caller goes away. On failure the previous session stays in place
    /// and the stored file is removed.
    pub async fn process_upload(
        self: &Arc<Self>,
        permit: BuildPermit,
        upload: PendingUpload,
    ) -> Result<UploadOutcome> {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = this.build_with_timeout(&permit, &upload).await;
            if result.is_err() {
                if let Err(e) = tokio::fs::remove_file(&upload.path).await {
                    warn!("Failed to remove failed upload {}: {}", upload.path.display(), e);
                }
            }
            result
        });

        handle.await.map_err(|e| {
            error!("Upload task failed: {}", e);
            SpolError::Io(std::io::Error::other(format!("Upload task failed: {}", e)))
        })?
    }

    /// Process a file already on disk (no copy, never deleted).
    pub async fn process_local(&self, path: &Path) -> Result<UploadOutcome> {
        let permit = self.try_begin_upload()?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video")
            .to_string();

        let upload = PendingUpload {
            stored_name: filename.clone(),
            filename,
            path: path.to_path_buf(),
        };
        self.build_with_timeout(&permit, &upload).await
    }

    async fn build_with_timeout(
        &self,
        permit: &BuildPermit,
        upload: &PendingUpload,
    ) -> Result<UploadOutcome> {
        match self.settings.pipeline.timeout_seconds {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), self.build(permit, upload))
                .await
                .map_err(|_| SpolError::Timeout(secs))?,
            None => self.build(permit, upload).await,
        }
    }

    /// Transcribe, extract, embed and publish.
    #[instrument(skip(self, permit), fields(filename = %upload.filename))]
    async fn build(&self, permit: &BuildPermit, upload: &PendingUpload) -> Result<UploadOutcome> {
        info!("Transcribing {}", upload.filename);
        let transcription = self
            .transcriber
            .transcribe(&upload.path)
            .await
            .map_err(|e| match e {
                SpolError::Transcription(_)
                | SpolError::ToolNotFound(_)
                | SpolError::ToolFailed(_) => e,
                other => SpolError::Transcription(other.to_string()),
            })?;

        let segments = extract_segments(&transcription);
        if segments.is_empty() {
            return Err(SpolError::NoSegments);
        }

        let index = build_index(
            &segments,
            self.embedder.as_ref(),
            self.settings.embedding.batch_size,
        )
        .await
        .map_err(|e| match e {
            SpolError::Embedding(_) => e,
            other => SpolError::Embedding(other.to_string()),
        })?;

        let duration_seconds = transcription.duration_seconds();
        let segments_count = segments.len();
        let video = VideoRef {
            filename: upload.filename.clone(),
            stored_name: upload.stored_name.clone(),
            path: upload.path.clone(),
            duration_seconds,
        };

        let previous = self.sessions.snapshot();
        let session = self.sessions.publish(permit, segments, index, video);

        if let Some(previous) = previous {
            self.discard_stored_video(&previous, &session);
        }

        Ok(UploadOutcome {
            segments_count,
            video_filename: upload.filename.clone(),
            duration: format_time(duration_seconds),
            duration_seconds,
            stored_name: upload.stored_name.clone(),
            version: session.version(),
        })
    }

    /// Remove the replaced session's upload, if we own it.
    fn discard_stored_video(&self, previous: &Session, current: &Session) {
        let old = &previous.video().path;
        if old == &current.video().path || !old.starts_with(&self.upload_dir) {
            return;
        }
        if let Err(e) = std::fs::remove_file(old) {
            warn!("Failed to remove replaced upload {}: {}", old.display(), e);
        }
    }

    /// Rank the current session's segments against `query`.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<QueryResult>> {
        let session = self.sessions.require()?;

        let query = query.trim();
        if query.is_empty() {
            return Err(SpolError::InvalidInput("Query cannot be empty".to_string()));
        }

        let top_k = top_k.unwrap_or(self.settings.search.top_k);

        search(
            query,
            session.segments(),
            session.index(),
            self.embedder.as_ref(),
            top_k,
        )
        .await
        .map_err(|e| match e {
            SpolError::Search(_) => e,
            other => SpolError::Search(other.to_string()),
        })
    }

    /// The current session's transcript as `[start - end] text` blocks.
    pub fn full_transcript(&self) -> Result<String> {
        Ok(self.sessions.require()?.segments().full_transcript())
    }

    /// Summarize results a client obtained from [`Pipeline::search`].
    pub async fn describe(&self, query: &str, results: &[QueryResult]) -> Result<String> {
        self.sessions.require()?;
        if results.is_empty() {
            return Err(SpolError::InvalidInput("No search results provided".to_string()));
        }

        let summarizer = self.summarizer.as_ref().ok_or(SpolError::SummarizerUnavailable)?;
        summarizer.summarize(query, results).await.map_err(|e| match e {
            SpolError::Summarization(_) => e,
            other => SpolError::Summarization(other.to_string()),
        })
    }

    /// Answer a free-form question about the loaded video.
    pub async fn ask(&self, question: &str, context: &str) -> Result<String> {
        self.sessions.require()?;
        let question = question.trim();
        if question.is_empty() {
            return Err(SpolError::InvalidInput("No question provided".to_string()));
        }

        let summarizer = self.summarizer.as_ref().ok_or(SpolError::SummarizerUnavailable)?;
        summarizer.answer(question, context).await.map_err(|e| match e {
            SpolError::Summarization(_) => e,
            other => SpolError::Summarization(other.to_string()),
        })
    }
}
