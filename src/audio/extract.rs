//! Audio processing utilities.
//!
//! This module shells out to ffmpeg to pull the audio track out of an uploaded
//! video and to cut long recordings into pieces the transcription API accepts.

use crate::error::{Result, SpolError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Extracts the audio track of `source` as 16 kHz mono MP3.
///
/// The output is written to `output_dir/<stem>.mp3`, replacing any existing file.
#[instrument(skip(output_dir), fields(source = %source.display()))]
pub async fn extract_audio(source: &Path, output_dir: &Path, stem: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let target_path = output_dir.join(format!("{}.mp3", stem));

    info!("Extracting audio to {}", target_path.display());

    let result = Command::new("ffmpeg")
        .arg("-i").arg(source)
        .arg("-vn")
        .arg("-ac").arg("1")
        .arg("-ar").arg("16000")
        .arg("-codec:a").arg("libmp3lame")
        .arg("-f").arg("mp3")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(&target_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(target_path),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(SpolError::ToolFailed(format!("ffmpeg audio extraction failed: {err}")))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SpolError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(SpolError::ToolFailed(format!("ffmpeg error: {e}"))),
    }
}

/// Segments a long audio file into smaller chunks for processing.
///
/// `total_duration` is the already probed length of `source`. Each chunk will
/// be approximately `chunk_seconds` long. Returns tuples of
/// (chunk_path, offset_seconds) for each segment.
#[instrument(skip(source, output_dir))]
pub async fn split_audio(
    source: &Path,
    output_dir: &Path,
    total_duration: f64,
    chunk_seconds: u32,
) -> Result<Vec<(PathBuf, f64)>> {
    std::fs::create_dir_all(output_dir)?;

    let plan = plan_chunks(total_duration, chunk_seconds);

    // Short audio doesn't need splitting
    if plan.len() <= 1 {
        return Ok(vec![(source.to_path_buf(), 0.0)]);
    }

    let base_name = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");

    let mut segments = Vec::with_capacity(plan.len());

    for (idx, (offset, length)) in plan.into_iter().enumerate() {
        let segment_path = output_dir.join(format!("{}_{:04}.mp3", base_name, idx));

        extract_segment(source, &segment_path, offset, length).await?;

        debug!("Created segment {} at offset {:.1}s", idx, offset);
        segments.push((segment_path, offset));
    }

    info!("Created {} audio segments", segments.len());
    Ok(segments)
}

/// Shortest audio worth sending to the transcription API as its own chunk.
const MIN_TRAILING_CHUNK_SECONDS: f64 = 1.0;

/// Offsets and lengths of the chunks covering `total_duration`.
fn plan_chunks(total_duration: f64, chunk_seconds: u32) -> Vec<(f64, f64)> {
    let chunk_len = chunk_seconds.max(1) as f64;

    if total_duration <= chunk_len {
        return vec![(0.0, total_duration.max(0.0))];
    }

    let mut plan = Vec::new();
    let mut offset = 0.0;
    while offset < total_duration {
        let remaining = total_duration - offset;
        // A remainder shorter than MIN_TRAILING_CHUNK_SECONDS rides along
        // with the last full chunk.
        if remaining - chunk_len < MIN_TRAILING_CHUNK_SECONDS {
            plan.push((offset, remaining));
            break;
        }
        plan.push((offset, chunk_len));
        offset += chunk_len;
    }
    plan
}

/// Extracts a time segment from an audio file.
async fn extract_segment(source: &Path, dest: &Path, start: f64, length: f64) -> Result<()> {
    // First attempt: stream copy (fast, no quality loss)
    let copy_result = Command::new("ffmpeg")
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-c").arg("copy")
        .arg("-y")
        .arg("-loglevel").arg("warning")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    if let Ok(status) = copy_result {
        if status.success() && dest.exists() {
            return Ok(());
        }
    }

    warn!("Stream copy failed, re-encoding segment");

    let encode_result = Command::new("ffmpeg")
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match encode_result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(SpolError::ToolFailed(format!("Segment extraction failed: {err}")))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SpolError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(SpolError::ToolFailed(format!("ffmpeg error: {e}"))),
    }
}

/// Queries the duration of a media file using ffprobe with JSON output.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SpolError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(SpolError::ToolFailed(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(SpolError::ToolFailed("ffprobe returned error".into()));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| SpolError::ToolFailed("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| SpolError::ToolFailed("Could not determine audio duration".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_audio_is_one_chunk() {
        assert_eq!(plan_chunks(42.0, 600), vec![(0.0, 42.0)]);
    }

    #[test]
    fn test_plan_covers_whole_duration() {
        let plan = plan_chunks(250.0, 100);
        assert_eq!(plan, vec![(0.0, 100.0), (100.0, 100.0), (200.0, 50.0)]);
    }

    #[test]
    fn test_sub_second_remainder_folds_into_last_chunk() {
        assert_eq!(plan_chunks(600.001, 600), vec![(0.0, 600.001)]);

        let plan = plan_chunks(1200.5, 600);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].0, 600.0);
        assert!((plan[1].1 - 600.5).abs() < 1e-9);
    }

    #[test]
    fn test_remainder_of_a_second_keeps_its_own_chunk() {
        assert_eq!(plan_chunks(601.0, 600), vec![(0.0, 600.0), (600.0, 1.0)]);
    }

    #[test]
    fn test_zero_chunk_length_does_not_loop() {
        let plan = plan_chunks(3.0, 0);
        assert_eq!(plan.len(), 3);
    }
}
