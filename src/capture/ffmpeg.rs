//! FFmpeg camera capture
//!
//! Records the camera by running FFmpeg against the platform capture input
//! (v4l2, AVFoundation or DirectShow) and encoding to H.264 MP4.

use crate::capture::traits::{
    CameraSelector, CaptureBackend, CaptureError, CaptureResult, DeviceHandle, FileRef,
    WriteStream,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// How long FFmpeg gets to report its first captured frame
const START_TIMEOUT: Duration = Duration::from_secs(5);

/// How long FFmpeg gets to flush the file after being asked to quit
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(10);

/// Platform capture input understood by FFmpeg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureInput {
    V4l2,
    AvFoundation,
    DirectShow,
}

impl CaptureInput {
    /// Capture input for the platform we are running on
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        {
            CaptureInput::AvFoundation
        }

        #[cfg(target_os = "windows")]
        {
            CaptureInput::DirectShow
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            CaptureInput::V4l2
        }
    }
}

/// Map a device ID to the path v4l2 opens ("0" -> "/dev/video0")
pub fn v4l2_device_path(device_id: &str) -> String {
    match device_id.parse::<u32>() {
        Ok(index) => format!("/dev/video{}", index),
        Err(_) => device_id.to_string(),
    }
}

/// Build the FFmpeg command line for recording `selector` into `output`
pub fn build_capture_args(input: CaptureInput, selector: &CameraSelector, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostats",
        "-progress",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let video_size = format!("{}x{}", selector.width, selector.height);
    let framerate = selector.fps.to_string();

    match input {
        CaptureInput::V4l2 => {
            args.extend([
                "-f".to_string(),
                "v4l2".to_string(),
                "-framerate".to_string(),
                framerate,
                "-video_size".to_string(),
                video_size,
                "-i".to_string(),
                v4l2_device_path(selector.device_id()),
            ]);
            if selector.capture_audio {
                args.extend([
                    "-f".to_string(),
                    "alsa".to_string(),
                    "-i".to_string(),
                    selector
                        .audio_device
                        .clone()
                        .unwrap_or_else(|| "default".to_string()),
                ]);
            }
        }
        CaptureInput::AvFoundation => {
            // AVFoundation takes "<video>:<audio>" in a single input
            let audio = if selector.capture_audio {
                selector.audio_device.as_deref().unwrap_or("0")
            } else {
                "none"
            };
            args.extend([
                "-f".to_string(),
                "avfoundation".to_string(),
                "-framerate".to_string(),
                framerate,
                "-video_size".to_string(),
                video_size,
                "-i".to_string(),
                format!("{}:{}", selector.device_id(), audio),
            ]);
        }
        CaptureInput::DirectShow => {
            let mut source = format!("video={}", selector.device_id());
            if selector.capture_audio {
                if let Some(ref audio) = selector.audio_device {
                    source.push_str(&format!(":audio={}", audio));
                }
            }
            args.extend([
                "-f".to_string(),
                "dshow".to_string(),
                "-framerate".to_string(),
                framerate,
                "-video_size".to_string(),
                video_size,
                "-i".to_string(),
                source,
            ]);
        }
    }

    args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-crf".to_string(),
        "18".to_string(),
        "-g".to_string(),
        (selector.fps * 2).to_string(),
    ]);

    if selector.capture_audio {
        args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
        ]);
    }

    args.extend([
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().to_string(),
    ]);

    args
}

/// Read `-progress` output until FFmpeg reports a frame.
///
/// Returns `false` when the output closes first, which means FFmpeg exited
/// without capturing anything.
pub async fn wait_for_first_frame<R>(lines: &mut Lines<R>) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        if line.starts_with("frame=") {
            return Ok(true);
        }
    }
    Ok(false)
}

fn collect_output<R>(mut reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = String::new();
        let _ = reader.read_to_string(&mut buf).await;
        buf
    })
}

/// A running FFmpeg capture
struct Writer {
    child: Child,
    /// Keeps the progress pipe drained while recording
    progress: JoinHandle<()>,
    /// Everything FFmpeg wrote to stderr
    stderr: JoinHandle<String>,
}

/// Camera backend that drives an FFmpeg child process per recording
pub struct FfmpegCameraBackend {
    input: CaptureInput,
    program: PathBuf,
    /// Selector used for each bound handle
    bound: HashMap<Uuid, CameraSelector>,
    /// Running FFmpeg processes keyed by stream
    writers: HashMap<Uuid, Writer>,
}

impl FfmpegCameraBackend {
    pub fn new() -> Self {
        Self::with_input(CaptureInput::current())
    }

    pub fn with_input(input: CaptureInput) -> Self {
        Self::with_program(input, "ffmpeg")
    }

    /// Use a specific FFmpeg executable
    pub fn with_program(input: CaptureInput, program: impl Into<PathBuf>) -> Self {
        Self {
            input,
            program: program.into(),
            bound: HashMap::new(),
            writers: HashMap::new(),
        }
    }

    async fn ffmpeg_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl Default for FfmpegCameraBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureBackend for FfmpegCameraBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn bind(&mut self, selector: &CameraSelector) -> CaptureResult<DeviceHandle> {
        if !self.ffmpeg_available().await {
            return Err(CaptureError::DeviceUnavailable(
                "FFmpeg not found. Please install FFmpeg".to_string(),
            ));
        }

        let device_id = selector.device_id();
        if self.input == CaptureInput::V4l2 {
            let path = v4l2_device_path(device_id);
            if !Path::new(&path).exists() {
                return Err(CaptureError::DeviceUnavailable(format!(
                    "no camera at {}",
                    path
                )));
            }
        }

        let handle = DeviceHandle::claim(device_id, format!("Camera {}", device_id))?;
        self.bound.insert(handle.id(), selector.clone());

        tracing::info!("Bound camera {} via {:?}", device_id, self.input);
        Ok(handle)
    }

    async fn begin_write(
        &mut self,
        handle: &DeviceHandle,
        output: &Path,
    ) -> CaptureResult<WriteStream> {
        let selector = self.bound.get(&handle.id()).ok_or_else(|| {
            CaptureError::DeviceUnavailable(format!("camera {} is not bound", handle.device_id()))
        })?;

        let args = build_capture_args(self.input, selector, output);
        tracing::info!("Starting FFmpeg capture: {:?}", args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::WriteFailed(format!("Failed to start FFmpeg: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::WriteFailed("Failed to capture FFmpeg stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CaptureError::WriteFailed("Failed to capture FFmpeg stderr".to_string()))?;
        let stderr = collect_output(stderr);

        // The camera only counts as open once FFmpeg has captured a frame
        let mut lines = BufReader::new(stdout).lines();
        let started = tokio::time::timeout(START_TIMEOUT, wait_for_first_frame(&mut lines)).await;
        if !matches!(started, Ok(Ok(true))) {
            let _ = child.start_kill();
            let status = child.wait().await?;
            let message = stderr.await.unwrap_or_default();
            let _ = tokio::fs::remove_file(output).await;

            let reason = match started {
                Err(_) => format!("no frames within {:?}", START_TIMEOUT),
                Ok(Err(e)) => format!("progress output failed: {}", e),
                Ok(Ok(_)) => format!("FFmpeg exited with {}", status),
            };
            tracing::warn!("Camera {} did not start: {} {}", handle.device_id(), reason, message.trim());
            return Err(CaptureError::DeviceUnavailable(format!(
                "camera {} could not be opened ({}): {}",
                handle.device_id(),
                reason,
                message.trim()
            )));
        }

        let progress = tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(frames) = line.strip_prefix("frame=") {
                    tracing::trace!("Captured {} frames", frames.trim());
                }
            }
        });

        let stream = WriteStream::new(output.to_path_buf());
        self.writers.insert(
            stream.id(),
            Writer {
                child,
                progress,
                stderr,
            },
        );
        Ok(stream)
    }

    async fn end_write(&mut self, stream: WriteStream) -> CaptureResult<FileRef> {
        let Writer {
            mut child,
            progress,
            stderr,
        } = self.writers.remove(&stream.id()).ok_or_else(|| {
            CaptureError::WriteFailed(format!("no writer for {:?}", stream.output()))
        })?;

        // 'q' asks FFmpeg to stop reading input and finalize the container
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(b"q").await {
                tracing::warn!("Failed to signal FFmpeg to stop: {}", e);
            }
        }

        let status = tokio::time::timeout(FINALIZE_TIMEOUT, child.wait())
            .await
            .map_err(|_| CaptureError::WriteFailed("FFmpeg did not finish in time".to_string()))?
            .map_err(|e| CaptureError::WriteFailed(format!("Failed to wait for FFmpeg: {}", e)))?;
        let _ = progress.await;
        let stderr = stderr.await.unwrap_or_default();

        if !status.success() {
            return Err(CaptureError::WriteFailed(format!(
                "FFmpeg exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        let file = FileRef::from_written(&stream)?;
        tracing::info!(
            "FFmpeg capture finished: {:?} ({} bytes)",
            file.path,
            file.size_bytes
        );
        Ok(file)
    }

    fn abort(&mut self, stream: WriteStream) {
        if let Some(mut writer) = self.writers.remove(&stream.id()) {
            if let Err(e) = writer.child.start_kill() {
                tracing::warn!("Failed to kill FFmpeg capture: {}", e);
            }
            writer.progress.abort();
            writer.stderr.abort();
        }
    }

    async fn release(&mut self, handle: DeviceHandle) {
        self.bound.remove(&handle.id());
        tracing::info!("Released camera {}", handle.device_id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> CameraSelector {
        CameraSelector {
            device_id: Some("1".to_string()),
            width: 640,
            height: 480,
            fps: 25,
            capture_audio: false,
            audio_device: None,
        }
    }

    #[test]
    fn test_v4l2_args() {
        let args = build_capture_args(CaptureInput::V4l2, &selector(), Path::new("/tmp/out.mp4"));
        let joined = args.join(" ");

        assert!(joined.contains("-f v4l2 -framerate 25 -video_size 640x480 -i /dev/video1"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-g 50"));
        assert!(!joined.contains("-c:a"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    }

    #[test]
    fn test_v4l2_args_with_audio() {
        let mut selector = selector();
        selector.capture_audio = true;
        let args = build_capture_args(CaptureInput::V4l2, &selector, Path::new("out.mp4"));
        let joined = args.join(" ");

        assert!(joined.contains("-f alsa -i default"));
        assert!(joined.contains("-c:a aac"));
    }

    #[test]
    fn test_avfoundation_combines_video_and_audio_input() {
        let mut selector = selector();
        let args = build_capture_args(CaptureInput::AvFoundation, &selector, Path::new("out.mp4"));
        assert!(args.contains(&"1:none".to_string()));

        selector.capture_audio = true;
        let args = build_capture_args(CaptureInput::AvFoundation, &selector, Path::new("out.mp4"));
        assert!(args.contains(&"1:0".to_string()));
    }

    #[test]
    fn test_dshow_uses_device_names() {
        let mut selector = selector();
        selector.device_id = Some("Integrated Camera".to_string());
        selector.capture_audio = true;
        selector.audio_device = Some("Microphone".to_string());
        let args = build_capture_args(CaptureInput::DirectShow, &selector, Path::new("out.mp4"));

        assert!(args.contains(&"video=Integrated Camera:audio=Microphone".to_string()));
    }

    #[test]
    fn test_progress_goes_to_stdout() {
        let args = build_capture_args(CaptureInput::V4l2, &selector(), Path::new("out.mp4"));
        assert!(args.join(" ").contains("-progress pipe:1"));
    }

    #[tokio::test]
    async fn test_first_frame_detection() {
        let mut lines = BufReader::new(&b"bitrate=N/A\nframe=1\nprogress=continue\n"[..]).lines();
        assert!(wait_for_first_frame(&mut lines).await.unwrap());

        let mut lines = BufReader::new(&b"progress=end\n"[..]).lines();
        assert!(!wait_for_first_frame(&mut lines).await.unwrap());
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then exit 0; fi\n{}\n",
            body
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn unique_selector() -> CameraSelector {
        CameraSelector {
            device_id: Some(format!("ffmpeg-test-{}", Uuid::new_v4())),
            ..selector()
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_busy_camera_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ffmpeg(
            dir.path(),
            "sleep 0.05\necho 'Could not open video device: Device or resource busy' >&2\nexit 1",
        );
        let mut backend = FfmpegCameraBackend::with_program(CaptureInput::AvFoundation, program);

        let handle = backend.bind(&unique_selector()).await.unwrap();
        let result = backend.begin_write(&handle, &dir.path().join("out.mp4")).await;

        match result {
            Err(CaptureError::DeviceUnavailable(message)) => {
                assert!(message.contains("Device or resource busy"))
            }
            other => panic!("expected DeviceUnavailable, got {:?}", other),
        }
        assert!(backend.writers.is_empty());
        backend.release(handle).await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_capture_runs_until_quit() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ffmpeg(
            dir.path(),
            "for last; do :; done\necho frame=1\necho progress=continue\nread _quit\nprintf movie > \"$last\"\nexit 0",
        );
        let mut backend = FfmpegCameraBackend::with_program(CaptureInput::AvFoundation, program);

        let handle = backend.bind(&unique_selector()).await.unwrap();
        let output = dir.path().join("out.mp4");
        let stream = backend.begin_write(&handle, &output).await.unwrap();
        let file = backend.end_write(stream).await.unwrap();

        assert_eq!(file.path, output);
        assert_eq!(file.size_bytes, 5);
        backend.release(handle).await;
    }

    #[test]
    fn test_v4l2_device_path() {
        assert_eq!(v4l2_device_path("0"), "/dev/video0");
        assert_eq!(v4l2_device_path("/dev/video7"), "/dev/video7");
    }
}
