//! System and configuration commands

use crate::config::AppConfig;
use crate::utils::error::{AppError, ErrorResponse};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tauri::State;

/// Loaded configuration and where it lives
pub struct ConfigState {
    pub config: RwLock<AppConfig>,
    pub path: PathBuf,
}

impl ConfigState {
    pub fn new(config: AppConfig, path: PathBuf) -> Self {
        Self {
            config: RwLock::new(config),
            path,
        }
    }
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub version: String,
    pub ffmpeg_available: bool,
}

/// Get basic system information
#[tauri::command]
pub async fn get_system_info() -> Result<SystemInfo, ErrorResponse> {
    let ffmpeg_available = tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false);

    Ok(SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ffmpeg_available,
    })
}

#[tauri::command]
pub async fn get_config(state: State<'_, ConfigState>) -> Result<AppConfig, ErrorResponse> {
    Ok(state.config.read().clone())
}

/// Persist a new configuration. Camera and directory changes apply on the
/// next launch.
#[tauri::command]
pub async fn update_config(
    state: State<'_, ConfigState>,
    config: AppConfig,
) -> Result<AppConfig, ErrorResponse> {
    if config.tick_interval_ms == 0 {
        return Err(AppError::Config("tickIntervalMs must be positive".to_string()).into());
    }
    config.save(&state.path)?;
    *state.config.write() = config.clone();
    Ok(config)
}
