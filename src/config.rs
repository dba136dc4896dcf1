//! Application configuration
//!
//! Stored as `config.json` in the app config directory.

use crate::capture::CameraSelector;
use crate::recorder::SessionConfig;
use crate::surface::{MergeOptions, SurfaceOptions};
use crate::utils::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Where new recordings are written
    pub output_dir: PathBuf,

    /// Where saved videos are collected
    pub library_dir: PathBuf,

    /// Where merged movies are written
    pub merge_dir: PathBuf,

    pub camera: CameraSelector,

    /// Interval between duration updates
    pub tick_interval_ms: u64,

    /// Recordings stop on their own after this many seconds
    pub max_duration_secs: Option<f64>,

    /// Save each recording to the library when the press ends
    pub auto_save: bool,

    pub save_merged_to_library: bool,

    /// AAC bitrate for merged audio, in FFmpeg notation
    pub audio_bitrate: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let base = default_base_dir();
        Self {
            output_dir: base.join("Recordings"),
            library_dir: base.join("Library"),
            merge_dir: base.join("Merged"),
            camera: CameraSelector::default(),
            tick_interval_ms: 1000,
            max_duration_secs: None,
            auto_save: true,
            save_merged_to_library: true,
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl AppConfig {
    /// Load config from `path`, or return defaults
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Failed to parse config {:?}: {}", path, e),
            },
            Err(e) => tracing::warn!("Failed to read config {:?}: {}", path, e),
        }

        Self::default()
    }

    /// Save config to `path`
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            output_dir: self.output_dir.clone(),
            camera: self.camera.clone(),
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            max_duration_secs: self.max_duration_secs,
        }
    }

    pub fn surface_options(&self) -> SurfaceOptions {
        SurfaceOptions {
            auto_save: self.auto_save,
        }
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            save_to_library: self.save_merged_to_library,
        }
    }
}

fn default_base_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Videos")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Video Recorder")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.tick_interval_ms, 1000);
        assert!(config.auto_save);
        assert!(config.save_merged_to_library);
        assert_eq!(config.audio_bitrate, "192k");
        assert!(config.max_duration_secs.is_none());
        assert_eq!(config.session_config().tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = AppConfig::default();
        config.max_duration_secs = Some(30.0);
        config.camera.device_id = Some("2".to_string());
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load_or_default(&path), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{ "autoSave": false, "camera": { "fps": 60 } }"#).unwrap();

        let config = AppConfig::load_or_default(&path);
        assert!(!config.auto_save);
        assert_eq!(config.camera.fps, 60);
        assert_eq!(config.camera.width, 1280);
        assert_eq!(config.tick_interval_ms, 1000);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "not json").unwrap();

        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
    }
}
