//! Presentation-side state machines
//!
//! Each surface owns its collaborators and reports what the user should see
//! through a broadcast channel of events.

pub mod merge;
pub mod recording;

pub use merge::{MergeEvent, MergeOptions, MergeSnapshot, MergeSurface};
pub use recording::{
    GesturePhase, RecordingSurface, SurfaceEvent, SurfaceOptions, SurfaceSnapshot, SurfaceState,
};

use crate::capture::CaptureError;
use crate::library::SaveError;
use crate::merge::{ExportError, PickError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Info,
    Error,
}

/// A message the user has to acknowledge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub kind: AlertKind,
}

impl Alert {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: AlertKind::Info,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: AlertKind::Error,
        }
    }
}

/// Errors returned by surface actions
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("No finished recording to save")]
    NothingToSave,

    #[error("Another action is still running")]
    Busy,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Pick(#[from] PickError),
}

impl SurfaceError {
    pub fn code(&self) -> &'static str {
        match self {
            SurfaceError::NothingToSave => "NOTHING_TO_SAVE",
            SurfaceError::Busy => "BUSY",
            SurfaceError::Capture(e) => e.code(),
            SurfaceError::Save(e) => e.code(),
            SurfaceError::Export(e) => e.code(),
            SurfaceError::Pick(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_errors_keep_their_codes() {
        let err: SurfaceError = CaptureError::DeviceUnavailable("gone".into()).into();
        assert_eq!(err.code(), "DEVICE_UNAVAILABLE");
        assert_eq!(err.to_string(), "Camera unavailable: gone");

        let err: SurfaceError = SaveError::SaveFailed("full".into()).into();
        assert_eq!(err.code(), "SAVE_FAILED");

        assert_eq!(SurfaceError::NothingToSave.code(), "NOTHING_TO_SAVE");
    }

    #[test]
    fn test_alert_serializes_camel_case() {
        let json = serde_json::to_value(Alert::error("Merge Failed", "boom")).unwrap();
        assert_eq!(json["title"], "Merge Failed");
        assert_eq!(json["kind"], "error");
    }
}
