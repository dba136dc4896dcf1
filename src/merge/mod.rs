//! Video/audio merge module
//!
//! Picking a video and an audio asset and exporting them as one movie.

pub mod ffmpeg;
pub mod picker;
pub mod types;

pub use ffmpeg::{AssetExporter, FfmpegExporter};
pub use picker::AssetPicker;
pub use types::{AssetKind, AssetRef, CombinedAssetRef, ExportError, MediaAssetPair, PickError};

#[cfg(feature = "desktop")]
pub use picker::DialogPicker;
