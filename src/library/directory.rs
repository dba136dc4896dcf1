//! Directory-backed asset library
//!
//! Saved movies are copied into a library directory under a unique name.

use super::{AssetLibrary, SaveError, SaveProgress, SavedAsset};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

/// Movie containers the library accepts
pub const COMPATIBLE_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v"];

const COPY_CHUNK: usize = 256 * 1024;

/// Whether a movie can be stored in the library
pub fn is_compatible(path: &Path) -> bool {
    let known_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| COMPATIBLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    known_extension
        && std::fs::metadata(path)
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
}

/// Pick a file name in `dir` that does not exist yet
fn unique_destination(dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    let ext = source.extension().and_then(|s| s.to_str()).unwrap_or("mp4");

    let mut candidate = dir.join(format!("{}.{}", stem, ext));
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}-{}.{}", stem, n, ext));
        n += 1;
    }
    candidate
}

/// Copy `total` bytes from `source` into a new file at `destination`.
///
/// The destination is removed again if anything goes wrong, so a failed
/// save never leaves a partial movie behind.
async fn copy_into<R>(
    source: R,
    total: u64,
    destination: &Path,
    progress: SaveProgress<'_>,
) -> Result<u64, SaveError>
where
    R: AsyncRead + Unpin,
{
    let result = copy_chunks(source, total, destination, progress).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(destination).await {
            tracing::warn!("Failed to remove partial copy {:?}: {}", destination, e);
        }
    }
    result
}

async fn copy_chunks<R>(
    mut source: R,
    total: u64,
    destination: &Path,
    progress: SaveProgress<'_>,
) -> Result<u64, SaveError>
where
    R: AsyncRead + Unpin,
{
    let mut target = File::create(destination).await?;

    let mut buffer = vec![0u8; COPY_CHUNK];
    let mut copied: u64 = 0;
    loop {
        let read = source
            .read(&mut buffer)
            .await
            .map_err(|e| SaveError::SaveFailed(format!("read failed after {} bytes: {}", copied, e)))?;
        if read == 0 {
            break;
        }
        target
            .write_all(&buffer[..read])
            .await
            .map_err(|e| SaveError::SaveFailed(format!("write to {:?} failed: {}", destination, e)))?;
        copied += read as u64;
        progress((copied as f64 / total as f64 * 100.0) as f32);
    }
    target.flush().await?;

    if copied != total {
        return Err(SaveError::SaveFailed(format!(
            "copied {} of {} bytes",
            copied, total
        )));
    }
    Ok(copied)
}

/// Library that keeps copies of saved movies in a directory
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AssetLibrary for DirectoryLibrary {
    async fn save(&self, path: &Path, progress: SaveProgress<'_>) -> Result<SavedAsset, SaveError> {
        if !is_compatible(path) {
            return Err(SaveError::Incompatible(path.to_path_buf()));
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let destination = unique_destination(&self.root, path);

        tracing::info!("Saving {:?} to library as {:?}", path, destination);
        progress(0.0);

        let source = File::open(path).await?;
        let total = source.metadata().await?.len();
        let copied = copy_into(source, total, &destination, progress).await?;

        progress(100.0);
        tracing::info!("Saved {} bytes to {:?}", copied, destination);

        Ok(SavedAsset {
            id: Uuid::new_v4(),
            path: destination,
            saved_at: Utc::now(),
        })
    }
}
