//! Transcribe command implementation.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::segments::extract_segments;
use crate::transcription::{format_transcript, OutputFormat, Transcriber, WhisperTranscriber};
use anyhow::Result;
use std::path::Path;

/// Run the transcribe command.
pub async fn run_transcribe(
    file: &str,
    format: &str,
    output: Option<String>,
    settings: Settings,
) -> Result<()> {
    let output_format: OutputFormat = format.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let path = Path::new(file);
    if !path.exists() {
        Output::error(&format!("File not found: {}", file));
        return Err(anyhow::anyhow!("File not found: {}", file));
    }

    if let Err(e) = preflight::check() {
        Output::error(&format!("{}", e));
        Output::info("Run 'spol doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let transcriber = WhisperTranscriber::with_config(&settings.transcription, &settings.temp_dir())?;

    let spinner = Output::spinner(&format!("Transcribing {}...", file));
    let raw = transcriber.transcribe(path).await;
    spinner.finish_and_clear();
    let raw = raw?;

    let segments = extract_segments(&raw);
    if segments.is_empty() {
        Output::warning("No segments found in transcription.");
        return Ok(());
    }

    let rendered = format_transcript(&segments, raw.duration_seconds(), output_format);

    match output {
        Some(output_path) => {
            std::fs::write(&output_path, rendered)?;
            Output::success(&format!(
                "Wrote {} segments to {}",
                segments.len(),
                output_path
            ));
        }
        None => print!("{}", rendered),
    }

    Ok(())
}
