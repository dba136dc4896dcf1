//! Process-wide camera leases
//!
//! A camera may be bound by at most one session at a time.

use parking_lot::{const_mutex, Mutex};
use std::collections::BTreeSet;

static CLAIMED: Mutex<BTreeSet<String>> = const_mutex(BTreeSet::new());

/// Exclusive claim on a device ID, released on drop
#[derive(Debug)]
pub struct DeviceLease {
    device_id: String,
}

impl DeviceLease {
    /// Claim `device_id`, or `None` if it is already held
    pub fn acquire(device_id: &str) -> Option<Self> {
        let mut claimed = CLAIMED.lock();
        if !claimed.insert(device_id.to_string()) {
            return None;
        }
        tracing::debug!("Leased camera {}", device_id);
        Some(Self {
            device_id: device_id.to_string(),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        CLAIMED.lock().remove(&self.device_id);
        tracing::debug!("Released camera lease {}", self.device_id);
    }
}

/// Whether a device is currently leased
pub fn is_claimed(device_id: &str) -> bool {
    CLAIMED.lock().contains(device_id)
}
