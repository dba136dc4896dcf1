//! Merge types
//!
//! Asset references, the picked asset pair and the merge error types.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Kind of media an asset holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Audio,
}

impl AssetKind {
    /// File extensions accepted for this kind
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            AssetKind::Video => &["mp4", "mov", "m4v", "mkv", "webm"],
            AssetKind::Audio => &["m4a", "mp3", "aac", "wav", "caf", "flac"],
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            AssetKind::Video => "Video",
            AssetKind::Audio => "Audio",
        }
    }

    /// Infer the kind from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        [AssetKind::Video, AssetKind::Audio]
            .into_iter()
            .find(|kind| kind.extensions().contains(&ext.as_str()))
    }
}

/// Asset picker errors. A cancelled pick is not an error.
#[derive(Error, Debug)]
pub enum PickError {
    #[error("Expected a {expected:?} asset, got {path:?}")]
    WrongKind { expected: AssetKind, path: PathBuf },

    #[error("Asset picker failed: {0}")]
    Dialog(String),
}

impl PickError {
    pub fn code(&self) -> &'static str {
        match self {
            PickError::WrongKind { .. } => "WRONG_ASSET_KIND",
            PickError::Dialog(_) => "PICKER_ERROR",
        }
    }
}

/// Reference to a picked media file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub path: PathBuf,
    pub kind: AssetKind,
}

impl AssetRef {
    /// Reference `path` as an asset of `kind`, checking its extension
    pub fn new(path: impl Into<PathBuf>, kind: AssetKind) -> Result<Self, PickError> {
        let path = path.into();
        if AssetKind::from_path(&path) != Some(kind) {
            return Err(PickError::WrongKind {
                expected: kind,
                path,
            });
        }
        Ok(Self { path, kind })
    }
}

/// The merged output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedAssetRef {
    pub path: PathBuf,
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("No {} asset loaded", .0.label())]
    MissingAsset(AssetKind),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    pub fn code(&self) -> &'static str {
        match self {
            ExportError::ExportFailed(_) | ExportError::Ffmpeg(_) => "EXPORT_FAILED",
            ExportError::MissingAsset(_) => "MISSING_ASSET",
            ExportError::Io(_) => "IO_ERROR",
        }
    }
}

/// A video and an audio asset, each optional until picked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAssetPair {
    pub video: Option<AssetRef>,
    pub audio: Option<AssetRef>,
}

impl MediaAssetPair {
    /// Store an asset in the slot matching its kind
    pub fn set(&mut self, asset: AssetRef) {
        match asset.kind {
            AssetKind::Video => self.video = Some(asset),
            AssetKind::Audio => self.audio = Some(asset),
        }
    }

    pub fn get(&self, kind: AssetKind) -> Option<&AssetRef> {
        match kind {
            AssetKind::Video => self.video.as_ref(),
            AssetKind::Audio => self.audio.as_ref(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.video.is_some() && self.audio.is_some()
    }

    /// Both assets, or the first missing kind
    pub fn both(&self) -> Result<(&AssetRef, &AssetRef), ExportError> {
        let video = self
            .video
            .as_ref()
            .ok_or(ExportError::MissingAsset(AssetKind::Video))?;
        let audio = self
            .audio
            .as_ref()
            .ok_or(ExportError::MissingAsset(AssetKind::Audio))?;
        Ok((video, audio))
    }
}
