//! FFmpeg merge exporter
//!
//! Combines the video track of one asset with the audio track of another.
//! The audio is cut to the video's duration, and the video stream is copied
//! without re-encoding.

use super::types::{AssetRef, CombinedAssetRef, ExportError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use uuid::Uuid;

/// Export collaborator: one video plus one audio in, one movie out
#[async_trait]
pub trait AssetExporter: Send + Sync {
    async fn export(&self, video: &AssetRef, audio: &AssetRef) -> Result<CombinedAssetRef, ExportError>;
}

/// Probe a media file's duration in seconds
pub async fn probe_duration(path: &Path) -> Result<f64, ExportError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| ExportError::Ffmpeg(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExportError::Ffmpeg(format!("ffprobe failed: {}", stderr.trim())));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(stdout: &str) -> Result<f64, ExportError> {
    let value = stdout.trim();
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .ok_or_else(|| ExportError::Ffmpeg(format!("Unexpected ffprobe duration: {:?}", value)))
}

/// Build the FFmpeg command line for merging
pub fn build_merge_args(
    video: &Path,
    audio: &Path,
    video_duration_secs: f64,
    audio_bitrate: &str,
    output: &Path,
) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-i".to_string(),
        audio.to_string_lossy().to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        audio_bitrate.to_string(),
        "-t".to_string(),
        format!("{:.3}", video_duration_secs),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Parse a `-progress` line into a percentage of `total_secs`.
///
/// Both `out_time_us` and `out_time_ms` carry microseconds.
pub fn parse_progress_line(line: &str, total_secs: f64) -> Option<f32> {
    let (key, value) = line.trim().split_once('=')?;
    if key != "out_time_us" && key != "out_time_ms" {
        return None;
    }
    let micros: f64 = value.parse().ok()?;
    if total_secs <= 0.0 || micros < 0.0 {
        return None;
    }
    Some(((micros / 1_000_000.0 / total_secs) * 100.0).min(100.0) as f32)
}

/// Merges assets by running FFmpeg
#[derive(Debug, Clone)]
pub struct FfmpegExporter {
    output_dir: PathBuf,
    audio_bitrate: String,
}

impl FfmpegExporter {
    pub fn new(output_dir: impl Into<PathBuf>, audio_bitrate: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            audio_bitrate: audio_bitrate.into(),
        }
    }

    fn next_output_path(&self) -> PathBuf {
        let id = Uuid::new_v4().simple().to_string();
        self.output_dir.join(format!("merge-video-{}.mov", &id[..8]))
    }
}

#[async_trait]
impl AssetExporter for FfmpegExporter {
    async fn export(&self, video: &AssetRef, audio: &AssetRef) -> Result<CombinedAssetRef, ExportError> {
        let duration = probe_duration(&video.path).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self.next_output_path();
        let args = build_merge_args(&video.path, &audio.path, duration, &self.audio_bitrate, &output);

        tracing::info!("Starting FFmpeg merge: {:?}", args);

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExportError::Ffmpeg(format!("Failed to start FFmpeg: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExportError::Ffmpeg("Failed to capture FFmpeg stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExportError::Ffmpeg("Failed to capture FFmpeg stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(percent) = parse_progress_line(&line, duration) {
                tracing::debug!("Merge progress: {:.0}%", percent);
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let _ = tokio::fs::remove_file(&output).await;
            return Err(ExportError::ExportFailed(format!(
                "FFmpeg exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        tracing::info!("Merge complete: {:?}", output);
        Ok(CombinedAssetRef { path: output })
    }
}
