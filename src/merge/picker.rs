//! Asset picker collaborator

use super::types::{AssetKind, AssetRef, PickError};
use async_trait::async_trait;

/// Lets the user choose a media file of a given kind
#[async_trait]
pub trait AssetPicker: Send + Sync {
    /// `Ok(None)` means the user cancelled
    async fn pick(&self, kind: AssetKind) -> Result<Option<AssetRef>, PickError>;
}

/// File dialog picker for the desktop shell
#[cfg(feature = "desktop")]
pub struct DialogPicker {
    app: tauri::AppHandle,
}

#[cfg(feature = "desktop")]
impl DialogPicker {
    pub fn new(app: tauri::AppHandle) -> Self {
        Self { app }
    }
}

#[cfg(feature = "desktop")]
#[async_trait]
impl AssetPicker for DialogPicker {
    async fn pick(&self, kind: AssetKind) -> Result<Option<AssetRef>, PickError> {
        use tauri_plugin_dialog::DialogExt;

        let app = self.app.clone();
        let picked = tokio::task::spawn_blocking(move || {
            app.dialog()
                .file()
                .set_title(format!("Choose {}", kind.label()))
                .add_filter(kind.label(), kind.extensions())
                .blocking_pick_file()
        })
        .await
        .map_err(|e| PickError::Dialog(e.to_string()))?;

        let Some(file) = picked else {
            tracing::debug!("{} pick cancelled", kind.label());
            return Ok(None);
        };

        let path = file
            .into_path()
            .map_err(|e| PickError::Dialog(e.to_string()))?;
        AssetRef::new(path, kind).map(Some)
    }
}
