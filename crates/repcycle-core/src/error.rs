//! Core error types for repcycle-core.
//!
//! The timing engine itself never fails: bad input is clamped and illegal
//! actions are no-ops. Errors only exist at the edges, where configuration is
//! read from disk or audio is written out.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for repcycle-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Audio output errors
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WAV encoding errors
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-separated key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// No usable configuration directory
    #[error("Could not determine a configuration directory")]
    NoConfigDir,
}

/// Audio output errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The environment has no audio output
    #[error("audio output is not supported in this environment")]
    Unsupported,

    /// The output exists but refused to start
    #[error("audio output could not be resumed: {0}")]
    ResumeFailed(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
