//! Press-and-hold recording surface
//!
//! Turns gesture phases into capture session calls, mirrors the recording
//! duration for display and hands finished movies to the asset library.

use super::{Alert, AlertKind, SurfaceError};
use crate::capture::{CaptureError, FileRef};
use crate::library::{AssetLibrary, SavedAsset};
use crate::recorder::{CaptureSession, SessionEvent};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

/// What the surface is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceState {
    Idle,
    Recording,
    Saving,
}

/// Phase of the long-press gesture on the record control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GesturePhase {
    Began,
    Changed,
    Ended,
    Cancelled,
}

/// Events emitted by the recording surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum SurfaceEvent {
    StateChanged { state: SurfaceState },
    /// `progress` is the fraction of the maximum duration, 0.0 when unbounded
    Duration { seconds: f64, progress: f64 },
    SaveProgress { percent: f32 },
    Alert(Alert),
    Saved(SavedAsset),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceOptions {
    /// Save each finished recording to the library when the press ends
    pub auto_save: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self { auto_save: true }
    }
}

/// Serializable view of the surface for the frontend
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceSnapshot {
    pub state: SurfaceState,
    pub duration_secs: f64,
    pub duration_progress: f64,
    pub save_progress: f32,
    pub last_recording: Option<FileRef>,
}

/// Returns the surface to `Idle` when dropped, so a press or save whose
/// future is dropped part-way does not leave it stuck in `Saving`
struct IdleOnExit {
    state: Arc<RwLock<SurfaceState>>,
    event_tx: broadcast::Sender<SurfaceEvent>,
}

impl Drop for IdleOnExit {
    fn drop(&mut self) {
        let mut state = self.state.write();
        if *state != SurfaceState::Idle {
            tracing::warn!("Surface interrupted while {:?}; returning to idle", *state);
            *state = SurfaceState::Idle;
            let _ = self.event_tx.send(SurfaceEvent::StateChanged {
                state: SurfaceState::Idle,
            });
        }
    }
}

pub struct RecordingSurface {
    session: CaptureSession,
    library: Arc<dyn AssetLibrary>,
    options: SurfaceOptions,

    state: Arc<RwLock<SurfaceState>>,
    duration_secs: f64,
    duration_progress: f64,
    save_progress: Arc<RwLock<f32>>,
    last_recording: Option<FileRef>,

    session_rx: broadcast::Receiver<SessionEvent>,
    finish_requested: bool,
    event_tx: broadcast::Sender<SurfaceEvent>,
}

impl RecordingSurface {
    pub fn new(session: CaptureSession, library: Arc<dyn AssetLibrary>, options: SurfaceOptions) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let session_rx = session.subscribe();
        Self {
            session,
            library,
            options,
            state: Arc::new(RwLock::new(SurfaceState::Idle)),
            duration_secs: 0.0,
            duration_progress: 0.0,
            save_progress: Arc::new(RwLock::new(0.0)),
            last_recording: None,
            session_rx,
            finish_requested: false,
            event_tx,
        }
    }

    pub fn state(&self) -> SurfaceState {
        *self.state.read()
    }

    /// Duration shown on screen, in seconds
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn duration_progress(&self) -> f64 {
        self.duration_progress
    }

    pub fn save_progress(&self) -> f32 {
        *self.save_progress.read()
    }

    pub fn last_recording(&self) -> Option<&FileRef> {
        self.last_recording.as_ref()
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot {
            state: self.state(),
            duration_secs: self.duration_secs,
            duration_progress: self.duration_progress,
            save_progress: self.save_progress(),
            last_recording: self.last_recording.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: SurfaceEvent) {
        let _ = self.event_tx.send(event);
    }

    fn set_state(&mut self, state: SurfaceState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            tracing::debug!("Surface state: {:?} -> {:?}", previous, state);
            self.emit(SurfaceEvent::StateChanged { state });
        }
    }

    fn idle_on_exit(&self) -> IdleOnExit {
        IdleOnExit {
            state: self.state.clone(),
            event_tx: self.event_tx.clone(),
        }
    }

    fn alert(&self, alert: Alert) {
        match alert.kind {
            AlertKind::Error => tracing::warn!("{}: {}", alert.title, alert.message),
            AlertKind::Info => tracing::info!("{}: {}", alert.title, alert.message),
        }
        self.emit(SurfaceEvent::Alert(alert));
    }

    fn show_duration(&mut self, seconds: f64) {
        self.duration_secs = seconds;
        self.duration_progress = match self.session.config().max_duration_secs {
            Some(max) if max > 0.0 => (seconds / max).min(1.0),
            _ => 0.0,
        };
        self.emit(SurfaceEvent::Duration {
            seconds,
            progress: self.duration_progress,
        });
    }

    /// Route a gesture phase to the matching action
    pub async fn handle_press(&mut self, phase: GesturePhase) -> Result<(), SurfaceError> {
        match phase {
            GesturePhase::Began => self.press_began().await,
            GesturePhase::Ended | GesturePhase::Cancelled => self.press_ended().await,
            GesturePhase::Changed => Ok(()),
        }
    }

    /// Start recording if idle
    pub async fn press_began(&mut self) -> Result<(), SurfaceError> {
        if self.state() != SurfaceState::Idle {
            tracing::debug!("Press began while {:?}; ignoring", self.state());
            return Ok(());
        }

        // Fresh receiver so nothing from an earlier recording is replayed
        self.session_rx = self.session.subscribe();
        self.finish_requested = false;

        if let Err(e) = self.session.start().await {
            let title = match e {
                CaptureError::DeviceUnavailable(_) => "Camera Unavailable",
                _ => "Recording Failed",
            };
            self.alert(Alert::error(title, e.to_string()));
            return Err(e.into());
        }

        self.set_state(SurfaceState::Recording);
        self.show_duration(0.0);
        Ok(())
    }

    /// Finish the recording if one is running
    pub async fn press_ended(&mut self) -> Result<(), SurfaceError> {
        if self.state() != SurfaceState::Recording {
            tracing::debug!("Press ended while {:?}; ignoring", self.state());
            return Ok(());
        }

        self.drain_session_events();
        self.finish_requested = false;

        self.set_state(SurfaceState::Saving);
        let _idle = self.idle_on_exit();
        *self.save_progress.write() = 0.0;

        let file = match self.session.stop().await {
            Ok(file) => file,
            Err(e) => {
                self.drain_session_events();
                self.set_state(SurfaceState::Idle);
                self.alert(Alert::error("Recording Failed", e.to_string()));
                return Err(e.into());
            }
        };
        self.drain_session_events();
        self.last_recording = Some(file.clone());

        let result = if self.options.auto_save {
            self.save_file(&file).await.map(|_| ())
        } else {
            Ok(())
        };

        self.set_state(SurfaceState::Idle);
        result
    }

    /// Save the last finished recording to the library again
    pub async fn save_video(&mut self) -> Result<SavedAsset, SurfaceError> {
        if self.state() != SurfaceState::Idle {
            return Err(SurfaceError::Busy);
        }
        let file = self.last_recording.clone().ok_or(SurfaceError::NothingToSave)?;

        self.set_state(SurfaceState::Saving);
        let _idle = self.idle_on_exit();
        let result = self.save_file(&file).await;
        self.set_state(SurfaceState::Idle);
        result
    }

    async fn save_file(&mut self, file: &FileRef) -> Result<SavedAsset, SurfaceError> {
        let progress = self.save_progress.clone();
        let event_tx = self.event_tx.clone();
        let report = move |percent: f32| {
            *progress.write() = percent;
            tracing::debug!("Save progress: {:.0}%", percent);
            let _ = event_tx.send(SurfaceEvent::SaveProgress { percent });
        };

        match self.library.save(&file.path, &report).await {
            Ok(asset) => {
                self.alert(Alert::info("Video Saved", "The video was saved to your library."));
                self.emit(SurfaceEvent::Saved(asset.clone()));
                Ok(asset)
            }
            Err(e) => {
                self.alert(Alert::error("Video Saving Failed", e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Apply one session event to the displayed state
    pub fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Tick { elapsed_secs } if self.state() == SurfaceState::Recording => {
                tracing::debug!("Duration: {:.1}s", elapsed_secs);
                self.show_duration(elapsed_secs);
            }
            SessionEvent::MaxDurationReached { elapsed_secs } if self.state() == SurfaceState::Recording => {
                tracing::info!("Finishing recording at the {:.1}s limit", elapsed_secs);
                self.finish_requested = true;
            }
            other => tracing::trace!("Session event: {:?}", other),
        }
    }

    fn drain_session_events(&mut self) {
        loop {
            match self.session_rx.try_recv() {
                Ok(event) => self.on_session_event(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Surface lagged behind session by {} events", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Process pending session events, finishing the recording when the
    /// duration limit was hit
    pub async fn pump(&mut self) -> Result<(), SurfaceError> {
        self.drain_session_events();
        if self.finish_requested && self.state() == SurfaceState::Recording {
            self.press_ended().await?;
        }
        Ok(())
    }

    /// Stop any recording and release the camera
    pub async fn teardown(&mut self) {
        tracing::info!("Tearing down recording surface");
        self.session.shutdown().await;
        self.drain_session_events();
        self.finish_requested = false;
        self.set_state(SurfaceState::Idle);
    }
}
