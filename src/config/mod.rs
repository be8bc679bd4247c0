//! Configuration module for Spol.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, SummaryPrompts};
pub use settings::{
    EmbeddingProvider, EmbeddingSettings, GeneralSettings, PipelineSettings, PromptSettings,
    SearchSettings, ServerSettings, Settings, SummarySettings, TranscriptionSettings,
};
