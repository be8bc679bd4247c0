//! Error types for Spol.

use thiserror::Error;

/// Library-level error type for Spol operations.
#[derive(Error, Debug)]
pub enum SpolError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No video file in request")]
    MissingFile,

    #[error("No video file selected")]
    EmptyFilename,

    #[error("File too large. Maximum allowed size is {limit_mb}MB")]
    FileTooLarge { limit_mb: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No transcription data available. Please upload a video first.")]
    NoSession,

    #[error("Another video is currently being processed. Try again once it finishes.")]
    Busy,

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("No segments found in transcription")]
    NoSegments,

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Processing timed out after {0} seconds")]
    Timeout(u64),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("Summarization is not enabled")]
    SummarizerUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),
}

/// Coarse classification of failures, used to pick a response for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or missing caller input, or a request that cannot be served right now.
    Input,
    /// A stage of the upload pipeline failed; the session was left unchanged.
    Pipeline,
    /// Ranking failed; the session was left unchanged.
    Search,
    /// An optional collaborator (summarizer) failed.
    Collaborator,
    /// Anything else.
    Internal,
}

impl SpolError {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SpolError::MissingFile
            | SpolError::EmptyFilename
            | SpolError::FileTooLarge { .. }
            | SpolError::InvalidInput(_)
            | SpolError::NoSession
            | SpolError::Busy => ErrorCategory::Input,

            SpolError::Transcription(_)
            | SpolError::NoSegments
            | SpolError::Embedding(_)
            | SpolError::Timeout(_)
            | SpolError::ToolNotFound(_)
            | SpolError::ToolFailed(_) => ErrorCategory::Pipeline,

            SpolError::Search(_) => ErrorCategory::Search,

            SpolError::Summarization(_) | SpolError::SummarizerUnavailable => {
                ErrorCategory::Collaborator
            }

            SpolError::Config(_)
            | SpolError::Io(_)
            | SpolError::Json(_)
            | SpolError::TomlParse(_)
            | SpolError::Http(_)
            | SpolError::OpenAI(_) => ErrorCategory::Internal,
        }
    }

    /// Stable machine-readable identifier for API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            SpolError::MissingFile => "no_file",
            SpolError::EmptyFilename => "empty_filename",
            SpolError::FileTooLarge { .. } => "file_too_large",
            SpolError::InvalidInput(_) => "invalid_input",
            SpolError::NoSession => "no_session",
            SpolError::Busy => "busy",
            SpolError::Transcription(_) | SpolError::ToolNotFound(_) | SpolError::ToolFailed(_) => {
                "transcription_failed"
            }
            SpolError::NoSegments => "no_segments",
            SpolError::Embedding(_) => "embedding_failed",
            SpolError::Timeout(_) => "timeout",
            SpolError::Search(_) => "search_failed",
            SpolError::Summarization(_) => "summarization_failed",
            SpolError::SummarizerUnavailable => "summarizer_unavailable",
            _ => "processing_failed",
        }
    }
}

/// Result type alias for Spol operations.
pub type Result<T> = std::result::Result<T, SpolError>;
