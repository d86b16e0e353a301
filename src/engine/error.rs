//! Audio engine error types

use thiserror::Error;

/// Errors that can occur while opening or running audio streams
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// No audio input device available
    #[error("No audio input device found")]
    NoInputDevice,

    /// No audio output device available
    #[error("No audio output device found")]
    NoOutputDevice,

    /// Failed to get or negotiate the device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build an audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start a stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// The thread owning a stream exited before reporting its result
    #[error("Audio stream thread failed: {0}")]
    BackendThread(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
