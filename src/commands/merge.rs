//! Merge surface commands
//!
//! Merge events are forwarded on the `merge-event` channel.

use crate::merge::{AssetRef, CombinedAssetRef};
use crate::surface::{MergeEvent, MergeSnapshot, MergeSurface};
use crate::utils::error::ErrorResponse;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, State};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;

pub const MERGE_EVENT: &str = "merge-event";

/// Application state for the merge surface
pub struct MergeState {
    pub surface: Arc<Mutex<MergeSurface>>,
}

impl MergeState {
    pub fn new(app: AppHandle, surface: MergeSurface) -> Self {
        let rx = surface.subscribe();
        tauri::async_runtime::spawn(forward_merge_events(app, rx));
        Self {
            surface: Arc::new(Mutex::new(surface)),
        }
    }
}

async fn forward_merge_events(app: AppHandle, mut rx: broadcast::Receiver<MergeEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(e) = app.emit(MERGE_EVENT, &event) {
                    tracing::warn!("Failed to emit {}: {}", MERGE_EVENT, e);
                }
            }
            Err(RecvError::Lagged(skipped)) => tracing::warn!("Dropped {} merge events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Let the user pick the video asset. `None` when the dialog was cancelled.
#[tauri::command]
pub async fn load_video(state: State<'_, MergeState>) -> Result<Option<AssetRef>, ErrorResponse> {
    Ok(state.surface.lock().await.load_video().await?)
}

/// Let the user pick the audio asset. `None` when the dialog was cancelled.
#[tauri::command]
pub async fn load_audio(state: State<'_, MergeState>) -> Result<Option<AssetRef>, ErrorResponse> {
    Ok(state.surface.lock().await.load_audio().await?)
}

/// Combine the loaded assets into one movie
#[tauri::command]
pub async fn merge(state: State<'_, MergeState>) -> Result<CombinedAssetRef, ErrorResponse> {
    Ok(state.surface.lock().await.merge().await?)
}

#[tauri::command]
pub async fn get_merge_state(state: State<'_, MergeState>) -> Result<MergeSnapshot, ErrorResponse> {
    Ok(state.surface.lock().await.snapshot())
}
