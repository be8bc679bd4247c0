//! HTTP API server command.

use crate::api::{router, AppState};
use crate::cli::{preflight, Output};
use crate::config::Settings;
use crate::pipeline::Pipeline;
use std::sync::Arc;
use tracing::info;

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check() {
        Output::warning(&format!("{}", e));
        Output::info("Uploads will fail until this is fixed. Run 'spol doctor' for details.");
    }

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let max_upload_mb = settings.server.max_upload_mb();

    let pipeline = Arc::new(Pipeline::new(settings)?);
    let upload_dir = pipeline.upload_dir().to_path_buf();
    let app = router(AppState::new(pipeline));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    Output::header("Spol API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("Uploads", &format!("{} (max {}MB)", upload_dir.display(), max_upload_mb));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Status", "GET  /status");
    Output::kv("Upload", "POST /upload");
    Output::kv("Search", "POST /search");
    Output::kv("Transcript", "GET  /transcript");
    Output::kv("Describe", "POST /describe");
    Output::kv("Ask", "POST /ask");
    Output::kv("Video", "GET  /video/{file}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
