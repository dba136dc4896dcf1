//! Asset library
//!
//! The "save to library" collaborator that finished recordings and merged
//! movies are handed to.

pub mod directory;

pub use directory::DirectoryLibrary;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Save progress callback, receives 0.0 to 100.0
pub type SaveProgress<'a> = &'a (dyn Fn(f32) + Send + Sync);

/// Asset library errors
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Failed to save asset: {0}")]
    SaveFailed(String),

    #[error("Video is not compatible with the library: {0:?}")]
    Incompatible(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SaveError {
    pub fn code(&self) -> &'static str {
        match self {
            SaveError::SaveFailed(_) => "SAVE_FAILED",
            SaveError::Incompatible(_) => "SAVE_INCOMPATIBLE",
            SaveError::Io(_) => "IO_ERROR",
        }
    }
}

/// An asset stored in the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAsset {
    pub id: Uuid,
    pub path: PathBuf,
    pub saved_at: DateTime<Utc>,
}

/// Destination for finished movies
#[async_trait]
pub trait AssetLibrary: Send + Sync {
    /// Save the movie at `path` into the library
    async fn save(&self, path: &Path, progress: SaveProgress<'_>) -> Result<SavedAsset, SaveError>;
}
