//! Webcam capture using nokhwa
//!
//! Frames are pulled from the camera on a capture thread and piped, in the
//! camera's native pixel format, into an FFmpeg H.264 encoder.

use crate::capture::traits::{
    CameraInfo, CameraSelector, CaptureBackend, CaptureError, CaptureResult, DeviceHandle,
    FileRef, Resolution, WriteStream,
};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use uuid::Uuid;

/// Get list of available cameras
pub fn get_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };

                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                    supported_resolutions: vec![
                        Resolution { width: 1920, height: 1080 },
                        Resolution { width: 1280, height: 720 },
                        Resolution { width: 640, height: 480 },
                    ],
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

fn camera_index(device_id: &str) -> CameraIndex {
    match device_id.parse::<u32>() {
        Ok(idx) => CameraIndex::Index(idx),
        Err(_) => CameraIndex::String(device_id.to_string()),
    }
}

/// Map nokhwa's frame format to the FFmpeg pixel format of the raw buffer
fn ffmpeg_pixel_format(format: FrameFormat) -> &'static str {
    match format {
        FrameFormat::YUYV => "yuyv422",
        FrameFormat::NV12 => "nv12",
        FrameFormat::RAWRGB => "rgb24",
        FrameFormat::GRAY => "gray",
        FrameFormat::MJPEG => "mjpeg",
        other => {
            tracing::warn!("Unknown camera format {:?}, falling back to yuyv422", other);
            "yuyv422"
        }
    }
}

fn encoder_input_args(width: u32, height: u32, fps: u32, pixel_format: &str) -> Vec<String> {
    // MJPEG frames are complete JPEGs and need the mjpeg demuxer
    if pixel_format == "mjpeg" {
        return vec![
            "-f".to_string(),
            "mjpeg".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
            "-i".to_string(),
            "-".to_string(),
        ];
    }
    vec![
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pixel_format".to_string(),
        pixel_format.to_string(),
        "-video_size".to_string(),
        format!("{}x{}", width, height),
        "-framerate".to_string(),
        fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
    ]
}

fn spawn_encoder(width: u32, height: u32, fps: u32, pixel_format: &str, output: &Path) -> std::io::Result<Child> {
    Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error"])
        .args(encoder_input_args(width, height, fps, pixel_format))
        .args([
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-pix_fmt",
            "yuv420p",
            "-crf",
            "18",
            "-g",
            &(fps * 2).to_string(),
            "-movflags",
            "+faststart",
        ])
        .arg(output)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
}

/// Capture loop: runs until `is_recording` is cleared, returns frames written
fn capture_loop(device_id: String, output: PathBuf, is_recording: Arc<AtomicBool>) -> Result<u64, String> {
    let format = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution);
    let mut camera = Camera::new(camera_index(&device_id), format)
        .map_err(|e| format!("Failed to open camera {}: {:?}", device_id, e))?;

    camera
        .open_stream()
        .map_err(|e| format!("Failed to open camera stream: {:?}", e))?;

    let camera_format = camera.camera_format();
    let width = camera_format.resolution().width();
    let height = camera_format.resolution().height();
    let fps = camera_format.frame_rate();
    let pixel_format = ffmpeg_pixel_format(camera_format.format());

    tracing::info!(
        "Webcam opened: {}x{} @ {}fps, ffmpeg pix_fmt={}",
        width,
        height,
        fps,
        pixel_format
    );

    let mut encoder = match spawn_encoder(width, height, fps, pixel_format, &output) {
        Ok(child) => child,
        Err(e) => {
            let _ = camera.stop_stream();
            return Err(format!("Failed to start FFmpeg encoder: {}", e));
        }
    };

    let mut frames: u64 = 0;
    if let Some(stdin) = encoder.stdin.as_mut() {
        while is_recording.load(Ordering::SeqCst) {
            // Blocks until the camera delivers the next frame
            match camera.frame() {
                Ok(frame) => {
                    if stdin.write_all(frame.buffer()).is_err() {
                        tracing::warn!("FFmpeg encoder closed its input");
                        break;
                    }
                    frames += 1;
                }
                Err(e) => tracing::debug!("Failed to capture frame: {:?}", e),
            }
        }
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!("Error stopping camera stream: {:?}", e);
    }

    drop(encoder.stdin.take());
    let result = encoder
        .wait_with_output()
        .map_err(|e| format!("Failed to wait for FFmpeg: {}", e))?;
    if !result.status.success() {
        return Err(format!(
            "FFmpeg exited with {}: {}",
            result.status,
            String::from_utf8_lossy(&result.stderr).trim()
        ));
    }

    Ok(frames)
}

struct ActiveCapture {
    is_recording: Arc<AtomicBool>,
    thread: JoinHandle<Result<u64, String>>,
}

/// Camera backend built on nokhwa's native input APIs
#[derive(Default)]
pub struct NokhwaCameraBackend {
    captures: HashMap<Uuid, ActiveCapture>,
}

impl NokhwaCameraBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CaptureBackend for NokhwaCameraBackend {
    fn name(&self) -> &str {
        "nokhwa"
    }

    async fn bind(&mut self, selector: &CameraSelector) -> CaptureResult<DeviceHandle> {
        let device_id = selector.device_id().to_string();
        let cameras = tokio::task::spawn_blocking(get_cameras)
            .await
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let camera = cameras
            .into_iter()
            .find(|c| c.id == device_id)
            .ok_or_else(|| CaptureError::DeviceUnavailable(format!("camera {} not found", device_id)))?;

        DeviceHandle::claim(camera.id, camera.name)
    }

    async fn begin_write(
        &mut self,
        handle: &DeviceHandle,
        output: &Path,
    ) -> CaptureResult<WriteStream> {
        let stream = WriteStream::new(output.to_path_buf());
        let is_recording = Arc::new(AtomicBool::new(true));

        let device_id = handle.device_id().to_string();
        let output = output.to_path_buf();
        let flag = is_recording.clone();
        let thread = std::thread::Builder::new()
            .name("webcam-capture".to_string())
            .spawn(move || capture_loop(device_id, output, flag))?;

        self.captures.insert(stream.id(), ActiveCapture { is_recording, thread });
        Ok(stream)
    }

    async fn end_write(&mut self, stream: WriteStream) -> CaptureResult<FileRef> {
        let capture = self.captures.remove(&stream.id()).ok_or_else(|| {
            CaptureError::WriteFailed(format!("no capture for {:?}", stream.output()))
        })?;

        capture.is_recording.store(false, Ordering::SeqCst);

        // The capture thread owns encoder finalization
        let frames = tokio::task::spawn_blocking(move || capture.thread.join())
            .await
            .map_err(|e| CaptureError::WriteFailed(e.to_string()))?
            .map_err(|_| CaptureError::WriteFailed("capture thread panicked".to_string()))?
            .map_err(CaptureError::WriteFailed)?;

        tracing::info!("Webcam capture stopped after {} frames", frames);
        FileRef::from_written(&stream)
    }

    fn abort(&mut self, stream: WriteStream) {
        if let Some(capture) = self.captures.remove(&stream.id()) {
            // The thread finishes its current frame and exits on its own
            capture.is_recording.store(false, Ordering::SeqCst);
        }
    }
}
