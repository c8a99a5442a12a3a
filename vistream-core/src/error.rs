use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template with default values has been created.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Navigation errors
    #[error("Invalid route: {reason}")]
    InvalidRoute { reason: String },

    // Source probe errors
    #[error("Source probe {probe} failed for {path}: {reason}")]
    ProbeFailed {
        probe: String,
        path: String,
        reason: String,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // Network errors
    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    // Playback errors
    #[error("Playback session is closed")]
    SessionClosed,

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
