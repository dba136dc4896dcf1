//! Scripted collaborators for unit tests

use crate::capture::{
    CameraSelector, CaptureBackend, CaptureError, CaptureResult, DeviceHandle, FileRef, WriteStream,
};
use crate::library::{AssetLibrary, SaveError, SaveProgress, SavedAsset};
use crate::merge::{AssetExporter, AssetKind, AssetPicker, AssetRef, CombinedAssetRef, ExportError, PickError};
use crate::recorder::SessionConfig;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Camera selector with a device id no other test uses
pub fn fake_selector() -> CameraSelector {
    CameraSelector {
        device_id: Some(format!("fake-{}", Uuid::new_v4())),
        capture_audio: false,
        ..CameraSelector::default()
    }
}

pub fn fake_session_config(output_dir: &Path) -> SessionConfig {
    SessionConfig {
        camera: fake_selector(),
        ..SessionConfig::new(output_dir)
    }
}

#[derive(Debug, Default)]
pub struct CameraLog {
    pub binds: usize,
    pub writes_begun: usize,
    pub writes_ended: usize,
    pub aborted: usize,
    pub released: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CameraScript {
    Working,
    Unavailable,
    FailingBegin,
    FailingWrite,
    SlowFinish,
}

/// Camera backend that writes a few bytes instead of video
pub struct FakeCamera {
    script: CameraScript,
    log: Arc<Mutex<CameraLog>>,
}

impl FakeCamera {
    fn scripted(script: CameraScript) -> Self {
        Self {
            script,
            log: Arc::new(Mutex::new(CameraLog::default())),
        }
    }

    pub fn new() -> Self {
        Self::scripted(CameraScript::Working)
    }

    /// Every bind fails with `DeviceUnavailable`
    pub fn unavailable() -> Self {
        Self::scripted(CameraScript::Unavailable)
    }

    /// Binds, then fails to open the output
    pub fn failing_begin() -> Self {
        Self::scripted(CameraScript::FailingBegin)
    }

    /// Records, then fails to finalize the output
    pub fn failing_write() -> Self {
        Self::scripted(CameraScript::FailingWrite)
    }

    /// Takes half a minute to finalize the output
    pub fn slow_finish() -> Self {
        Self::scripted(CameraScript::SlowFinish)
    }

    pub fn log(&self) -> Arc<Mutex<CameraLog>> {
        self.log.clone()
    }
}

#[async_trait]
impl CaptureBackend for FakeCamera {
    fn name(&self) -> &str {
        "fake"
    }

    async fn bind(&mut self, selector: &CameraSelector) -> CaptureResult<DeviceHandle> {
        self.log.lock().binds += 1;
        if self.script == CameraScript::Unavailable {
            return Err(CaptureError::DeviceUnavailable("no camera attached".to_string()));
        }
        DeviceHandle::claim(selector.device_id(), "Fake Camera")
    }

    async fn begin_write(&mut self, _handle: &DeviceHandle, output: &Path) -> CaptureResult<WriteStream> {
        if self.script == CameraScript::FailingBegin {
            return Err(CaptureError::WriteFailed("output not writable".to_string()));
        }
        std::fs::write(output, b"fake movie data")?;
        self.log.lock().writes_begun += 1;
        Ok(WriteStream::new(output.to_path_buf()))
    }

    async fn end_write(&mut self, stream: WriteStream) -> CaptureResult<FileRef> {
        self.log.lock().writes_ended += 1;
        if self.script == CameraScript::FailingWrite {
            let _ = std::fs::remove_file(stream.output());
            return Err(CaptureError::WriteFailed("disk full".to_string()));
        }
        if self.script == CameraScript::SlowFinish {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        }
        FileRef::from_written(&stream)
    }

    fn abort(&mut self, stream: WriteStream) {
        self.log.lock().aborted += 1;
        let _ = std::fs::remove_file(stream.output());
    }

    async fn release(&mut self, handle: DeviceHandle) {
        self.log.lock().released += 1;
        drop(handle);
    }
}

/// In-memory library that records what it was asked to save
#[derive(Default)]
pub struct FakeLibrary {
    failing: AtomicBool,
    saved: Mutex<Vec<PathBuf>>,
}

impl FakeLibrary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Vec<PathBuf> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl AssetLibrary for FakeLibrary {
    async fn save(&self, path: &Path, progress: SaveProgress<'_>) -> Result<SavedAsset, SaveError> {
        progress(0.0);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SaveError::SaveFailed("library is read-only".to_string()));
        }
        progress(50.0);
        progress(100.0);
        self.saved.lock().push(path.to_path_buf());
        Ok(SavedAsset {
            id: Uuid::new_v4(),
            path: path.to_path_buf(),
            saved_at: Utc::now(),
        })
    }
}

/// Picker that replays queued answers, then reports cancellation
#[derive(Default)]
pub struct FakePicker {
    answers: Mutex<VecDeque<Result<Option<AssetRef>, PickError>>>,
    asked: Mutex<Vec<AssetKind>>,
}

impl FakePicker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, answer: Result<Option<AssetRef>, PickError>) {
        self.answers.lock().push_back(answer);
    }

    pub fn choose(&self, path: &str, kind: AssetKind) {
        self.answer(Ok(Some(AssetRef {
            path: PathBuf::from(path),
            kind,
        })));
    }

    pub fn asked(&self) -> Vec<AssetKind> {
        self.asked.lock().clone()
    }
}

#[async_trait]
impl AssetPicker for FakePicker {
    async fn pick(&self, kind: AssetKind) -> Result<Option<AssetRef>, PickError> {
        self.asked.lock().push(kind);
        self.answers.lock().pop_front().unwrap_or(Ok(None))
    }
}

/// Exporter that writes a placeholder movie
pub struct FakeExporter {
    output_dir: PathBuf,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeExporter {
    pub fn new(output_dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            output_dir: output_dir.to_path_buf(),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetExporter for FakeExporter {
    async fn export(&self, video: &AssetRef, audio: &AssetRef) -> Result<CombinedAssetRef, ExportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(ExportError::ExportFailed(format!(
                "cannot combine {:?} with {:?}",
                video.path, audio.path
            )));
        }
        let path = self.output_dir.join(format!("merge-video-{}.mov", n));
        std::fs::write(&path, b"merged movie")?;
        Ok(CombinedAssetRef { path })
    }
}
