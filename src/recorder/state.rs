//! Recording state management
//!
//! Defines the capture session state machine, its events and configuration.

use crate::capture::{CameraSelector, FileRef};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Current state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No recording in progress
    Idle,
    /// Currently recording
    Recording,
    /// Output file is being flushed and closed
    Finalizing,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Events emitted by a capture session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum SessionEvent {
    /// Recording started
    Started,
    /// Periodic duration update while recording
    #[serde(rename_all = "camelCase")]
    Tick { elapsed_secs: f64 },
    /// The configured maximum duration was reached
    #[serde(rename_all = "camelCase")]
    MaxDurationReached { elapsed_secs: f64 },
    /// Recording stopped and the file was written
    Stopped { file: FileRef },
    /// Recording failed
    Failed { message: String },
}

/// Configuration for a capture session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory new recordings are written to
    pub output_dir: PathBuf,

    /// Camera to bind on start
    pub camera: CameraSelector,

    /// Interval between duration ticks
    pub tick_interval: Duration,

    /// Optional recording length limit in seconds
    pub max_duration_secs: Option<f64>,
}

impl SessionConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            camera: CameraSelector::default(),
            tick_interval: Duration::from_secs(1),
            max_duration_secs: None,
        }
    }
}
