//! Capture trait definitions
//!
//! Platform-agnostic types and the backend contract a camera implementation
//! provides to the recording session.

use crate::capture::lease::DeviceLease;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while binding a camera or writing a recording
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to write recording: {0}")]
    WriteFailed(String),

    #[error("Recording already in progress")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Stable error code reported to the frontend
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            CaptureError::WriteFailed(_) => "WRITE_FAILED",
            CaptureError::AlreadyRecording => "ALREADY_RECORDING",
            CaptureError::NotRecording => "NOT_RECORDING",
            CaptureError::Io(_) => "IO_ERROR",
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Supported resolutions
    pub supported_resolutions: Vec<Resolution>,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Information about an audio input device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

/// Which camera to bind and how to capture from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraSelector {
    /// Device ID/index to capture from (None = default camera)
    pub device_id: Option<String>,

    /// Requested capture width
    pub width: u32,

    /// Requested capture height
    pub height: u32,

    /// Capture FPS
    pub fps: u32,

    /// Whether to record a microphone track alongside the video
    pub capture_audio: bool,

    /// Microphone device (None = platform default)
    pub audio_device: Option<String>,
}

impl CameraSelector {
    /// Device ID to bind, falling back to the first camera
    pub fn device_id(&self) -> &str {
        self.device_id.as_deref().unwrap_or("0")
    }
}

impl Default for CameraSelector {
    fn default() -> Self {
        Self {
            device_id: None,
            width: 1280,
            height: 720,
            fps: 30,
            capture_audio: true,
            audio_device: None,
        }
    }
}

/// A bound camera device.
///
/// Holding a handle holds the process-wide lease on its device ID, so no
/// other session can bind the same camera until the handle is dropped.
#[derive(Debug)]
pub struct DeviceHandle {
    id: Uuid,
    device_id: String,
    name: String,
    _lease: DeviceLease,
}

impl DeviceHandle {
    /// Claim a device, failing if another handle already holds it
    pub fn claim(device_id: impl Into<String>, name: impl Into<String>) -> CaptureResult<Self> {
        let device_id = device_id.into();
        let lease = DeviceLease::acquire(&device_id).ok_or_else(|| {
            CaptureError::DeviceUnavailable(format!(
                "camera {} is in use by another session",
                device_id
            ))
        })?;

        Ok(Self {
            id: Uuid::new_v4(),
            device_id,
            name: name.into(),
            _lease: lease,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An output file that is being written
#[derive(Debug)]
pub struct WriteStream {
    id: Uuid,
    output: PathBuf,
    started_at: DateTime<Utc>,
}

impl WriteStream {
    pub fn new(output: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            output,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// A finished recording on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl FileRef {
    /// Build a reference for a stream whose writer has closed.
    ///
    /// A missing or empty output counts as a failed write.
    pub fn from_written(stream: &WriteStream) -> CaptureResult<Self> {
        let metadata = std::fs::metadata(stream.output()).map_err(|e| {
            CaptureError::WriteFailed(format!("output {:?} missing: {}", stream.output(), e))
        })?;

        if metadata.len() == 0 {
            return Err(CaptureError::WriteFailed(format!(
                "output {:?} is empty",
                stream.output()
            )));
        }

        let now = Utc::now();
        let duration_secs =
            (now - stream.started_at()).num_milliseconds().max(0) as f64 / 1000.0;

        Ok(Self {
            path: stream.output().to_path_buf(),
            duration_secs,
            size_bytes: metadata.len(),
            created_at: now,
        })
    }
}

/// A camera capture implementation consumed by [`CaptureSession`].
///
/// [`CaptureSession`]: crate::recorder::CaptureSession
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Backend name, for logging
    fn name(&self) -> &str;

    /// Bind a camera device
    async fn bind(&mut self, selector: &CameraSelector) -> CaptureResult<DeviceHandle>;

    /// Start writing the bound camera to `output`
    async fn begin_write(&mut self, handle: &DeviceHandle, output: &Path)
        -> CaptureResult<WriteStream>;

    /// Flush and close the output file
    async fn end_write(&mut self, stream: WriteStream) -> CaptureResult<FileRef>;

    /// Tear down a writer without finalizing it
    fn abort(&mut self, stream: WriteStream);

    /// Release a bound device
    async fn release(&mut self, handle: DeviceHandle) {
        tracing::debug!("{}: releasing camera {}", self.name(), handle.device_id());
        drop(handle);
    }
}
