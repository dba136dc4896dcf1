//! Recording surface commands
//!
//! The frontend forwards the record control's long-press phases here and
//! receives surface events on the `recording-event` channel.

use crate::capture::{list_cameras, list_microphones, AudioDeviceInfo, CameraInfo};
use crate::library::SavedAsset;
use crate::recorder::SessionEvent;
use crate::surface::{GesturePhase, RecordingSurface, SurfaceEvent, SurfaceSnapshot};
use crate::utils::error::ErrorResponse;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, State};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;

pub const RECORDING_EVENT: &str = "recording-event";

/// Application state for the recording surface
pub struct CameraState {
    pub surface: Arc<Mutex<RecordingSurface>>,
}

impl CameraState {
    /// Wrap `surface` and start forwarding its events to the webview
    pub fn new(app: AppHandle, surface: RecordingSurface) -> Self {
        let surface_rx = surface.subscribe();
        let session_rx = surface.session().subscribe();
        let surface = Arc::new(Mutex::new(surface));

        tauri::async_runtime::spawn(forward_surface_events(app, surface_rx));
        tauri::async_runtime::spawn(pump_session_events(surface.clone(), session_rx));

        Self { surface }
    }

    /// Stop any recording before the app exits
    pub async fn teardown(&self) {
        self.surface.lock().await.teardown().await;
    }
}

async fn forward_surface_events(app: AppHandle, mut rx: broadcast::Receiver<SurfaceEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(e) = app.emit(RECORDING_EVENT, &event) {
                    tracing::warn!("Failed to emit {}: {}", RECORDING_EVENT, e);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Dropped {} recording events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Wake the surface whenever the session has something to say
async fn pump_session_events(
    surface: Arc<Mutex<RecordingSurface>>,
    mut rx: broadcast::Receiver<SessionEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(_) | Err(RecvError::Lagged(_)) => {
                if let Err(e) = surface.lock().await.pump().await {
                    tracing::warn!("Recording surface update failed: {}", e);
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Forward a long-press gesture phase
#[tauri::command]
pub async fn hold_screen(
    state: State<'_, CameraState>,
    phase: GesturePhase,
) -> Result<SurfaceSnapshot, ErrorResponse> {
    let mut surface = state.surface.lock().await;
    surface.handle_press(phase).await?;
    Ok(surface.snapshot())
}

/// Save the last recording to the library
#[tauri::command]
pub async fn save_video(state: State<'_, CameraState>) -> Result<SavedAsset, ErrorResponse> {
    let mut surface = state.surface.lock().await;
    Ok(surface.save_video().await?)
}

#[tauri::command]
pub async fn get_surface_state(state: State<'_, CameraState>) -> Result<SurfaceSnapshot, ErrorResponse> {
    Ok(state.surface.lock().await.snapshot())
}

/// Get list of available cameras/webcams
#[tauri::command]
pub async fn get_cameras() -> Result<Vec<CameraInfo>, ErrorResponse> {
    tokio::task::spawn_blocking(list_cameras)
        .await
        .map_err(|e| ErrorResponse {
            code: "DEVICE_ENUMERATION_FAILED".to_string(),
            message: e.to_string(),
        })
}

/// Get list of available audio input devices (microphones)
#[tauri::command]
pub async fn get_microphones() -> Result<Vec<AudioDeviceInfo>, ErrorResponse> {
    Ok(list_microphones())
}
