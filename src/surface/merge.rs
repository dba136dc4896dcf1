//! Video/audio merge surface
//!
//! Loads a video and an audio asset through the picker and combines them
//! with the exporter while an activity indicator is shown.

use super::{Alert, AlertKind, SurfaceError};
use crate::library::{AssetLibrary, SavedAsset};
use crate::merge::{AssetExporter, AssetKind, AssetPicker, AssetRef, CombinedAssetRef, MediaAssetPair};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted by the merge surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum MergeEvent {
    AssetLoaded { asset: AssetRef },
    Activity { active: bool },
    Merged { output: CombinedAssetRef },
    Alert(Alert),
    Saved(SavedAsset),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOptions {
    /// Save merged movies to the library
    pub save_to_library: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            save_to_library: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSnapshot {
    pub pair: MediaAssetPair,
    pub merging: bool,
    pub last_output: Option<CombinedAssetRef>,
}

pub struct MergeSurface {
    pair: MediaAssetPair,
    picker: Arc<dyn AssetPicker>,
    exporter: Arc<dyn AssetExporter>,
    library: Arc<dyn AssetLibrary>,
    options: MergeOptions,
    merging: bool,
    last_output: Option<CombinedAssetRef>,
    event_tx: broadcast::Sender<MergeEvent>,
}

impl MergeSurface {
    pub fn new(
        picker: Arc<dyn AssetPicker>,
        exporter: Arc<dyn AssetExporter>,
        library: Arc<dyn AssetLibrary>,
        options: MergeOptions,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            pair: MediaAssetPair::default(),
            picker,
            exporter,
            library,
            options,
            merging: false,
            last_output: None,
            event_tx,
        }
    }

    pub fn pair(&self) -> &MediaAssetPair {
        &self.pair
    }

    /// Whether the activity indicator is showing
    pub fn is_merging(&self) -> bool {
        self.merging
    }

    pub fn last_output(&self) -> Option<&CombinedAssetRef> {
        self.last_output.as_ref()
    }

    pub fn snapshot(&self) -> MergeSnapshot {
        MergeSnapshot {
            pair: self.pair.clone(),
            merging: self.merging,
            last_output: self.last_output.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MergeEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: MergeEvent) {
        let _ = self.event_tx.send(event);
    }

    fn alert(&self, alert: Alert) {
        match alert.kind {
            AlertKind::Error => tracing::warn!("{}: {}", alert.title, alert.message),
            AlertKind::Info => tracing::info!("{}: {}", alert.title, alert.message),
        }
        self.emit(MergeEvent::Alert(alert));
    }

    fn set_merging(&mut self, merging: bool) {
        self.merging = merging;
        self.emit(MergeEvent::Activity { active: merging });
    }

    pub async fn load_video(&mut self) -> Result<Option<AssetRef>, SurfaceError> {
        self.load(AssetKind::Video).await
    }

    pub async fn load_audio(&mut self) -> Result<Option<AssetRef>, SurfaceError> {
        self.load(AssetKind::Audio).await
    }

    async fn load(&mut self, kind: AssetKind) -> Result<Option<AssetRef>, SurfaceError> {
        if self.merging {
            return Err(SurfaceError::Busy);
        }

        let asset = match self.picker.pick(kind).await {
            Ok(Some(asset)) => asset,
            Ok(None) => {
                tracing::debug!("{} selection cancelled", kind.label());
                return Ok(None);
            }
            Err(e) => {
                self.alert(Alert::error("Asset Not Loaded", e.to_string()));
                return Err(e.into());
            }
        };

        tracing::info!("{} asset loaded: {:?}", kind.label(), asset.path);
        self.pair.set(asset.clone());
        self.emit(MergeEvent::AssetLoaded { asset: asset.clone() });
        self.alert(Alert::info("Asset Loaded", format!("{} Loaded", kind.label())));
        Ok(Some(asset))
    }

    /// Combine the loaded video and audio into one movie
    pub async fn merge(&mut self) -> Result<CombinedAssetRef, SurfaceError> {
        if self.merging {
            return Err(SurfaceError::Busy);
        }

        let (video, audio) = match self.pair.both() {
            Ok((video, audio)) => (video.clone(), audio.clone()),
            Err(e) => {
                self.alert(Alert::error("Missing Asset", e.to_string()));
                return Err(e.into());
            }
        };

        tracing::info!("Merging {:?} with {:?}", video.path, audio.path);
        self.set_merging(true);
        let result = self.exporter.export(&video, &audio).await;
        self.set_merging(false);

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                self.alert(Alert::error("Merge Failed", e.to_string()));
                return Err(e.into());
            }
        };

        self.last_output = Some(output.clone());
        self.emit(MergeEvent::Merged {
            output: output.clone(),
        });

        if !self.options.save_to_library {
            self.alert(Alert::info("Merge Complete", format!("Saved to {}", output.path.display())));
            return Ok(output);
        }

        match self.library.save(&output.path, &|_: f32| {}).await {
            Ok(asset) => {
                self.alert(Alert::info("Video Saved", "The merged video was saved to your library."));
                self.emit(MergeEvent::Saved(asset));
                Ok(output)
            }
            Err(e) => {
                self.alert(Alert::error("Video Saving Failed", e.to_string()));
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{ExportError, PickError};
    use crate::testing::{FakeExporter, FakeLibrary, FakePicker};
    use tempfile::tempdir;

    struct Fixture {
        picker: Arc<FakePicker>,
        exporter: Arc<FakeExporter>,
        library: Arc<FakeLibrary>,
        surface: MergeSurface,
        _dir: tempfile::TempDir,
    }

    fn fixture(options: MergeOptions) -> Fixture {
        let dir = tempdir().unwrap();
        let picker = FakePicker::new();
        let exporter = FakeExporter::new(dir.path());
        let library = FakeLibrary::new();
        let surface = MergeSurface::new(picker.clone(), exporter.clone(), library.clone(), options);
        Fixture {
            picker,
            exporter,
            library,
            surface,
            _dir: dir,
        }
    }

    fn drain(rx: &mut broadcast::Receiver<MergeEvent>) -> Vec<MergeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn alerts(events: &[MergeEvent]) -> Vec<(String, String)> {
        events
            .iter()
            .filter_map(|e| match e {
                MergeEvent::Alert(alert) => Some((alert.title.clone(), alert.message.clone())),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_load_and_merge() {
        let mut f = fixture(MergeOptions::default());
        let mut rx = f.surface.subscribe();
        f.picker.choose("clip.mov", AssetKind::Video);
        f.picker.choose("song.m4a", AssetKind::Audio);

        assert!(f.surface.load_video().await.unwrap().is_some());
        assert!(f.surface.load_audio().await.unwrap().is_some());
        assert!(f.surface.pair().is_complete());

        let output = f.surface.merge().await.unwrap();
        assert!(output.path.exists());
        assert!(!f.surface.is_merging());
        assert_eq!(f.surface.last_output(), Some(&output));
        assert_eq!(f.library.saved(), vec![output.path.clone()]);
        assert_eq!(f.picker.asked(), vec![AssetKind::Video, AssetKind::Audio]);

        let events = drain(&mut rx);
        let activity: Vec<bool> = events
            .iter()
            .filter_map(|e| match e {
                MergeEvent::Activity { active } => Some(*active),
                _ => None,
            })
            .collect();
        assert_eq!(activity, vec![true, false]);
        assert_eq!(
            alerts(&events),
            vec![
                ("Asset Loaded".to_string(), "Video Loaded".to_string()),
                ("Asset Loaded".to_string(), "Audio Loaded".to_string()),
                (
                    "Video Saved".to_string(),
                    "The merged video was saved to your library.".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_merge_requires_both_assets() {
        let mut f = fixture(MergeOptions::default());
        f.picker.choose("clip.mov", AssetKind::Video);
        f.surface.load_video().await.unwrap();

        let result = f.surface.merge().await;
        assert!(matches!(
            result,
            Err(SurfaceError::Export(ExportError::MissingAsset(AssetKind::Audio)))
        ));
        assert_eq!(f.exporter.calls(), 0);
        assert!(f.surface.pair().video.is_some());
        assert!(f.surface.last_output().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_pick_changes_nothing() {
        let mut f = fixture(MergeOptions::default());
        f.picker.choose("clip.mov", AssetKind::Video);
        f.surface.load_video().await.unwrap();
        let mut rx = f.surface.subscribe();

        // No queued answer: the picker reports cancellation
        assert_eq!(f.surface.load_video().await.unwrap(), None);
        assert_eq!(
            f.surface.pair().video.as_ref().map(|a| a.path.clone()),
            Some(std::path::PathBuf::from("clip.mov"))
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_wrong_kind_alerts() {
        let mut f = fixture(MergeOptions::default());
        let mut rx = f.surface.subscribe();
        f.picker.answer(Err(PickError::WrongKind {
            expected: AssetKind::Audio,
            path: "clip.mov".into(),
        }));

        let result = f.surface.load_audio().await;
        assert!(matches!(result, Err(SurfaceError::Pick(_))));
        assert!(f.surface.pair().audio.is_none());
        assert_eq!(alerts(&drain(&mut rx))[0].0, "Asset Not Loaded");
    }

    #[tokio::test]
    async fn test_export_failure_hides_activity() {
        let mut f = fixture(MergeOptions::default());
        f.picker.choose("clip.mov", AssetKind::Video);
        f.picker.choose("song.m4a", AssetKind::Audio);
        f.surface.load_video().await.unwrap();
        f.surface.load_audio().await.unwrap();
        f.exporter.set_failing(true);
        let mut rx = f.surface.subscribe();

        let result = f.surface.merge().await;
        assert!(matches!(
            result,
            Err(SurfaceError::Export(ExportError::ExportFailed(_)))
        ));
        assert!(!f.surface.is_merging());
        assert!(f.library.saved().is_empty());
        assert!(f.surface.pair().is_complete());

        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(MergeEvent::Alert(a)) if a.title == "Merge Failed"));
    }

    #[tokio::test]
    async fn test_merge_without_library_save() {
        let mut f = fixture(MergeOptions {
            save_to_library: false,
        });
        f.picker.choose("clip.mov", AssetKind::Video);
        f.picker.choose("song.m4a", AssetKind::Audio);
        f.surface.load_video().await.unwrap();
        f.surface.load_audio().await.unwrap();

        f.surface.merge().await.unwrap();
        assert!(f.library.saved().is_empty());
        assert_eq!(f.exporter.calls(), 1);
    }

    #[tokio::test]
    async fn test_library_failure_keeps_output() {
        let mut f = fixture(MergeOptions::default());
        f.picker.choose("clip.mov", AssetKind::Video);
        f.picker.choose("song.m4a", AssetKind::Audio);
        f.surface.load_video().await.unwrap();
        f.surface.load_audio().await.unwrap();
        f.library.set_failing(true);

        let result = f.surface.merge().await;
        assert!(matches!(result, Err(SurfaceError::Save(_))));
        assert!(f.surface.last_output().is_some());
    }
}
