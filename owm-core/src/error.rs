use std::path::PathBuf;

use thiserror::Error;

use crate::cast::CastError;

/// Errors surfaced by the core library.
///
/// Only [`OwmError::Provider`] and [`OwmError::NotFoundInWindow`] are
/// recoverable: [`crate::bridge::bridge`] turns them into an
/// [`ErrorDescriptor`] carried next to a placeholder payload. Everything
/// else propagates.
#[derive(Debug, Error)]
pub enum OwmError {
    #[error("OpenWeatherMap rejected the API key (status 401): {text}")]
    Authentication { text: String },

    #[error("OpenWeatherMap request failed with status {status}: {text}")]
    Provider { status: u16, text: String },

    #[error("{category} weather for date {date} not found")]
    NotFoundInWindow { category: String, date: String },

    #[error(transparent)]
    Cast(#[from] CastError),

    #[error("Invalid granularity '{0}'")]
    InvalidGranularity(String),

    #[error("OpenWeatherMap is unreachable")]
    UpstreamUnavailable(#[from] reqwest::Error),

    #[error("Failed to decode OpenWeatherMap response")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl OwmError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, OwmError::Authentication { .. })
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache key '{0}' not found")]
    KeyNotFound(String),

    #[error("Cache I/O failed for '{}'", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Cache entry '{}' is not valid JSON", .0.display())]
    Serde(PathBuf, #[source] serde_json::Error),

    #[error("Could not determine platform cache directory")]
    NoLocation,

    #[error("Unknown cache eviction policy '{0}' (expected least-recently-stored or none)")]
    UnknownPolicy(String),
}

/// Status and body text of a recoverable upstream failure.
///
/// `ErrorDescriptor::none()` (status 200, empty text) stands for "no error".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDescriptor {
    pub status: u16,
    pub text: String,
}

impl ErrorDescriptor {
    pub const OK_STATUS: u16 = 200;

    pub fn none() -> Self {
        Self {
            status: Self::OK_STATUS,
            text: String::new(),
        }
    }

    pub fn new(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status != Self::OK_STATUS
    }
}

impl Default for ErrorDescriptor {
    fn default() -> Self {
        Self::none()
    }
}
