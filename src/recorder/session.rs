//! Capture session
//!
//! Owns the camera binding for one recording at a time and drives the
//! `Idle -> Recording -> Finalizing -> Idle` lifecycle.

use super::state::{SessionConfig, SessionEvent, SessionState};
use super::ticker::{ScheduledTask, MIN_TICK_INTERVAL};
use crate::capture::{CaptureBackend, CaptureError, CaptureResult, DeviceHandle, FileRef, WriteStream};
use chrono::Utc;
use parking_lot::RwLock;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Everything that only exists while recording.
///
/// The device handle lives here, so a session cannot be recording
/// without a bound camera.
struct ActiveRecording {
    handle: DeviceHandle,
    stream: WriteStream,
    ticker: ScheduledTask,
}

enum Phase {
    Idle,
    Recording(ActiveRecording),
    Finalizing,
}

/// Puts the session back to `Idle` when finalizing ends, including when
/// the `stop()` future is dropped before the writer finished.
struct FinalizeGuard<'a> {
    phase: &'a mut Phase,
    event_tx: &'a broadcast::Sender<SessionEvent>,
    finished: bool,
}

impl Drop for FinalizeGuard<'_> {
    fn drop(&mut self) {
        *self.phase = Phase::Idle;
        if !self.finished {
            tracing::warn!("Recording was interrupted while finalizing");
            let _ = self.event_tx.send(SessionEvent::Failed {
                message: "recording was interrupted while finalizing".to_string(),
            });
        }
    }
}

/// Records from one camera through a [`CaptureBackend`]
pub struct CaptureSession {
    backend: Box<dyn CaptureBackend>,
    config: SessionConfig,
    phase: Phase,

    /// Elapsed seconds of the current (or last) recording
    elapsed: Arc<RwLock<f64>>,

    /// Event broadcaster
    event_tx: broadcast::Sender<SessionEvent>,
}

impl CaptureSession {
    /// Create a new capture session
    pub fn new(backend: Box<dyn CaptureBackend>, mut config: SessionConfig) -> Self {
        if config.tick_interval < MIN_TICK_INTERVAL {
            tracing::warn!(
                "Tick interval {:?} is too short, using {:?}",
                config.tick_interval,
                MIN_TICK_INTERVAL
            );
            config.tick_interval = MIN_TICK_INTERVAL;
        }

        let (event_tx, _) = broadcast::channel(100);
        Self {
            backend,
            config,
            phase: Phase::Idle,
            elapsed: Arc::new(RwLock::new(0.0)),
            event_tx,
        }
    }

    /// Get the current session state
    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Recording(_) => SessionState::Recording,
            Phase::Finalizing => SessionState::Finalizing,
        }
    }

    /// The bound camera, present exactly while recording
    pub fn bound_device(&self) -> Option<&DeviceHandle> {
        match &self.phase {
            Phase::Recording(active) => Some(&active.handle),
            _ => None,
        }
    }

    /// Elapsed seconds, counted in whole tick intervals
    pub fn duration_secs(&self) -> f64 {
        *self.elapsed.read()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn next_output_path(&self) -> PathBuf {
        let id = Uuid::new_v4().simple().to_string();
        self.config.output_dir.join(format!(
            "recording-{}-{}.mp4",
            Utc::now().format("%Y%m%d-%H%M%S"),
            &id[..8]
        ))
    }

    fn spawn_ticker(&self) -> ScheduledTask {
        let elapsed = self.elapsed.clone();
        let event_tx = self.event_tx.clone();
        let step = self.config.tick_interval.as_secs_f64();
        let max_duration = self.config.max_duration_secs;
        let mut max_reported = false;

        ScheduledTask::every("recording-duration", self.config.tick_interval, move |_| {
            let elapsed_secs = {
                let mut elapsed = elapsed.write();
                *elapsed += step;
                *elapsed
            };
            tracing::debug!("Recording duration: {:.1}s", elapsed_secs);
            let _ = event_tx.send(SessionEvent::Tick { elapsed_secs });

            if let Some(max) = max_duration {
                if !max_reported && elapsed_secs >= max {
                    max_reported = true;
                    tracing::info!("Maximum recording duration of {}s reached", max);
                    let _ = event_tx.send(SessionEvent::MaxDurationReached { elapsed_secs });
                }
            }
            ControlFlow::Continue(())
        })
    }

    /// Start recording
    pub async fn start(&mut self) -> CaptureResult<()> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(CaptureError::AlreadyRecording);
        }

        tracing::info!(
            "Starting recording with {} backend to: {:?}",
            self.backend.name(),
            self.config.output_dir
        );

        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let handle = match self.backend.bind(&self.config.camera).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Failed to bind camera: {}", e);
                self.emit(SessionEvent::Failed { message: e.to_string() });
                return Err(e);
            }
        };

        let output = self.next_output_path();
        let stream = match self.backend.begin_write(&handle, &output).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Failed to begin writing {:?}: {}", output, e);
                self.backend.release(handle).await;
                self.emit(SessionEvent::Failed { message: e.to_string() });
                return Err(e);
            }
        };

        *self.elapsed.write() = 0.0;
        self.emit(SessionEvent::Started);

        let ticker = self.spawn_ticker();
        self.phase = Phase::Recording(ActiveRecording {
            handle,
            stream,
            ticker,
        });

        tracing::info!("Recording started: {:?}", output);
        Ok(())
    }

    /// Stop recording and return the finished file
    pub async fn stop(&mut self) -> CaptureResult<FileRef> {
        let active = match std::mem::replace(&mut self.phase, Phase::Finalizing) {
            Phase::Recording(active) => active,
            other => {
                self.phase = other;
                return Err(CaptureError::NotRecording);
            }
        };

        tracing::info!("Stopping recording");

        let ActiveRecording {
            handle,
            stream,
            mut ticker,
        } = active;
        ticker.cancel();

        let result = {
            let mut guard = FinalizeGuard {
                phase: &mut self.phase,
                event_tx: &self.event_tx,
                finished: false,
            };
            let result = self.backend.end_write(stream).await;
            self.backend.release(handle).await;
            guard.finished = true;
            result
        };

        match result {
            Ok(file) => {
                tracing::info!(
                    "Recording stopped. Duration: {:.1}s, file: {:?}",
                    self.duration_secs(),
                    file.path
                );
                self.emit(SessionEvent::Stopped { file: file.clone() });
                Ok(file)
            }
            Err(e) => {
                let err = match e {
                    CaptureError::WriteFailed(_) => e,
                    other => CaptureError::WriteFailed(other.to_string()),
                };
                tracing::error!("Recording failed: {}", err);
                self.emit(SessionEvent::Failed { message: err.to_string() });
                Err(err)
            }
        }
    }

    /// Force-stop before teardown, discarding the outcome
    pub async fn shutdown(&mut self) {
        if matches!(self.phase, Phase::Recording(_)) {
            tracing::info!("Shutting down active recording");
            if let Err(e) = self.stop().await {
                tracing::warn!("Recording lost during shutdown: {}", e);
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Phase::Recording(active) = std::mem::replace(&mut self.phase, Phase::Idle) {
            tracing::warn!("Capture session dropped while recording; aborting writer");
            let ActiveRecording {
                handle,
                stream,
                mut ticker,
            } = active;
            ticker.cancel();
            self.backend.abort(stream);
            drop(handle);
        }
    }
}
