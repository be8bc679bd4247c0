//! Search command implementation.
//!
//! Runs the whole pipeline against a local file without starting the server.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use anyhow::Result;
use std::path::Path;

/// Run the search command.
pub async fn run_search(
    file: &str,
    query: &str,
    top_k: Option<usize>,
    settings: Settings,
) -> Result<()> {
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

    let pipeline = Pipeline::new(settings)?;

    let spinner = Output::spinner(&format!("Indexing {}...", file));
    let outcome = pipeline.process_local(path).await;
    spinner.finish_and_clear();
    let outcome = outcome?;

    Output::info(&format!(
        "Indexed {} segments ({})",
        outcome.segments_count, outcome.duration
    ));

    let spinner = Output::spinner("Searching...");
    let results = pipeline.search(query, top_k).await;
    spinner.finish_and_clear();

    match results {
        Ok(results) if results.is_empty() => {
            Output::warning("No results found matching your query.");
        }
        Ok(results) => {
            Output::success(&format!("Found {} results", results.len()));
            for (i, result) in results.iter().enumerate() {
                Output::search_result(i + 1, result);
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
