//! Spol - semantic search over a video's transcript
//!
//! Upload a video, transcribe it, and retrieve the transcript segments most
//! relevant to a free-text query.
//!
//! The name "Spol" comes from the Norwegian "spole", to wind a tape forward or
//! back to the right spot.
//!
//! # Overview
//!
//! Spol allows you to:
//! - Transcribe a video into time-aligned segments with Whisper
//! - Embed every segment and rank them against a query by cosine similarity
//! - Summarize the best matches or ask free-form questions with an LLM
//! - Do all of the above over a small JSON HTTP API or from the command line
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `audio` - ffmpeg audio extraction and splitting
//! - `transcription` - Speech-to-text and transcript export formats
//! - `segments` - Segment extraction from raw transcription output
//! - `embedding` - Embedding generation
//! - `index` - Embedding index over a segment collection
//! - `search` - Similarity ranking
//! - `session` - The single active video session
//! - `summary` - LLM summaries and answers
//! - `web_context` - Optional web snippets for answers
//! - `pipeline` - Upload → index → query coordination
//! - `api` - HTTP API
//!
//! # Example
//!
//! ```rust,no_run
//! use spol::config::Settings;
//! use spol::pipeline::Pipeline;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(settings)?;
//!
//!     let outcome = pipeline.process_local(Path::new("talk.mp4")).await?;
//!     println!("Indexed {} segments", outcome.segments_count);
//!
//!     for result in pipeline.search("borrow checker", Some(3)).await? {
//!         println!("[{} - {}] {}", result.start, result.end, result.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod audio;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod openai;
pub mod pipeline;
pub mod search;
pub mod segments;
pub mod session;
pub mod summary;
pub mod transcription;
pub mod web_context;

pub use error::{Result, SpolError};
