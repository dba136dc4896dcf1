//! Device enumeration

use crate::capture::traits::{AudioDeviceInfo, CameraInfo, Resolution};

fn default_resolutions() -> Vec<Resolution> {
    vec![
        Resolution { width: 1920, height: 1080 },
        Resolution { width: 1280, height: 720 },
        Resolution { width: 640, height: 480 },
    ]
}

/// Get list of available cameras
pub fn list_cameras() -> Vec<CameraInfo> {
    #[cfg(feature = "nokhwa")]
    {
        crate::capture::webcam::get_cameras()
    }

    #[cfg(all(not(feature = "nokhwa"), target_os = "linux"))]
    {
        list_v4l2_cameras(std::path::Path::new("/dev"))
    }

    #[cfg(all(not(feature = "nokhwa"), not(target_os = "linux")))]
    {
        vec![CameraInfo {
            id: "0".to_string(),
            name: "Default Camera".to_string(),
            supported_resolutions: default_resolutions(),
        }]
    }
}

/// Scan a device directory for `videoN` nodes
#[cfg_attr(any(feature = "nokhwa", not(target_os = "linux")), allow(dead_code))]
fn list_v4l2_cameras(dev_dir: &std::path::Path) -> Vec<CameraInfo> {
    let entries = match std::fs::read_dir(dev_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to read {:?}: {}", dev_dir, e);
            return Vec::new();
        }
    };

    let mut indices: Vec<u32> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix("video"))
                .and_then(|index| index.parse().ok())
        })
        .collect();
    indices.sort_unstable();

    indices
        .into_iter()
        .map(|index| CameraInfo {
            id: index.to_string(),
            name: format!("Video device {}", index),
            supported_resolutions: default_resolutions(),
        })
        .collect()
}

/// Get list of available audio input devices (microphones)
pub fn list_microphones() -> Vec<AudioDeviceInfo> {
    #[cfg(feature = "microphones")]
    {
        use cpal::traits::{DeviceTrait, HostTrait};

        let host = cpal::default_host();
        let default_name = host
            .default_input_device()
            .and_then(|device| device.name().ok());

        match host.input_devices() {
            Ok(devices) => devices
                .filter_map(|device| device.name().ok())
                .map(|name| AudioDeviceInfo {
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    id: name.clone(),
                    name,
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to enumerate audio inputs: {}", e);
                Vec::new()
            }
        }
    }

    #[cfg(not(feature = "microphones"))]
    {
        Vec::new()
    }
}
