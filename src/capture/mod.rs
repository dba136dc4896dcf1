//! Camera capture collaborators
//!
//! The backend contract consumed by the recording session, device leases,
//! device enumeration and the concrete FFmpeg / nokhwa backends.

pub mod devices;
pub mod ffmpeg;
pub mod lease;
pub mod traits;

#[cfg(feature = "nokhwa")]
pub mod webcam;

pub use devices::{list_cameras, list_microphones};
pub use ffmpeg::FfmpegCameraBackend;
pub use traits::{
    AudioDeviceInfo, CameraInfo, CameraSelector, CaptureBackend, CaptureError, CaptureResult,
    DeviceHandle, FileRef, Resolution, WriteStream,
};

#[cfg(feature = "nokhwa")]
pub use webcam::NokhwaCameraBackend;

/// Backend used when none is configured explicitly
pub fn default_backend() -> Box<dyn CaptureBackend> {
    #[cfg(feature = "nokhwa")]
    {
        Box::new(NokhwaCameraBackend::new())
    }

    #[cfg(not(feature = "nokhwa"))]
    {
        Box::new(FfmpegCameraBackend::new())
    }
}
