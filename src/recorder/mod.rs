//! Recording system module
//!
//! - CaptureSession: the camera recording state machine
//! - ScheduledTask: the cancellable duration ticker
//! - Session state, events and configuration

pub mod session;
pub mod state;
pub mod ticker;

pub use session::CaptureSession;
pub use state::{SessionConfig, SessionEvent, SessionState};
pub use ticker::ScheduledTask;
