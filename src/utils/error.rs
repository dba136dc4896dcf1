//! Error types and handling
//!
//! Application-wide error type and the shape errors take at the frontend.

use crate::capture::CaptureError;
use crate::library::SaveError;
use crate::merge::{ExportError, PickError};
use crate::surface::SurfaceError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Pick(#[from] PickError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Capture(e) => e.code(),
            AppError::Export(e) => e.code(),
            AppError::Pick(e) => e.code(),
            AppError::Save(e) => e.code(),
            AppError::Surface(e) => e.code(),
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Error response for frontend
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<SurfaceError> for ErrorResponse {
    fn from(error: SurfaceError) -> Self {
        AppError::from(error).into()
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
