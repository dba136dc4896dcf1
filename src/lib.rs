//! Video Recorder - hold to record, then merge video with audio.
//!
//! The library holds the capture session, the recording and merge surfaces
//! with their collaborators, and (with the `desktop` feature) the Tauri
//! application that hosts them.

pub mod capture;
pub mod config;
pub mod library;
pub mod merge;
pub mod recorder;
pub mod surface;
pub mod utils;

#[cfg(feature = "desktop")]
pub mod commands;

#[cfg(test)]
pub(crate) mod testing;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "video_recorder=debug,video_recorder_lib=debug,tauri=info";

/// Initialize tracing/logging. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Initialize the application
#[cfg(feature = "desktop")]
pub fn run() -> anyhow::Result<()> {
    use commands::camera::CameraState;
    use commands::merge::MergeState;
    use commands::system::ConfigState;
    use config::{AppConfig, CONFIG_FILE_NAME};
    use library::{AssetLibrary, DirectoryLibrary};
    use merge::{DialogPicker, FfmpegExporter};
    use recorder::CaptureSession;
    use std::sync::Arc;
    use surface::{MergeSurface, RecordingSurface};
    use tauri::Manager;

    init_tracing();

    tracing::info!("Starting Video Recorder v{}", env!("CARGO_PKG_VERSION"));

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let config_path = app.path().app_config_dir()?.join(CONFIG_FILE_NAME);
            let config = AppConfig::load_or_default(&config_path);
            tracing::info!("Recordings go to {:?}", config.output_dir);

            let handle = app.handle().clone();
            let library: Arc<dyn AssetLibrary> = Arc::new(DirectoryLibrary::new(&config.library_dir));

            let session = CaptureSession::new(capture::default_backend(), config.session_config());
            let recording = RecordingSurface::new(session, library.clone(), config.surface_options());

            let merge = MergeSurface::new(
                Arc::new(DialogPicker::new(handle.clone())),
                Arc::new(FfmpegExporter::new(&config.merge_dir, config.audio_bitrate.clone())),
                library,
                config.merge_options(),
            );

            app.manage(CameraState::new(handle.clone(), recording));
            app.manage(MergeState::new(handle, merge));
            app.manage(ConfigState::new(config, config_path));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Recording commands
            commands::camera::hold_screen,
            commands::camera::save_video,
            commands::camera::get_surface_state,
            commands::camera::get_cameras,
            commands::camera::get_microphones,
            // Merge commands
            commands::merge::load_video,
            commands::merge::load_audio,
            commands::merge::merge,
            commands::merge::get_merge_state,
            // System commands
            commands::system::get_system_info,
            commands::system::get_config,
            commands::system::update_config,
        ])
        .build(tauri::generate_context!())?;

    app.run(|handle, event| {
        if let tauri::RunEvent::Exit = event {
            if let Some(state) = handle.try_state::<CameraState>() {
                tauri::async_runtime::block_on(state.teardown());
            }
        }
    });

    Ok(())
}
