//! Engine Error Types

use std::path::PathBuf;

use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

/// Errors that can occur in the audio engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Audio file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode audio: {0}")]
    DecodeError(String),

    #[error("Audio source contains no samples")]
    EmptySource,

    #[error("No output device available")]
    NoOutputDevice,

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to play audio stream: {0}")]
    StreamPlayError(String),

    #[error("Failed to pause audio stream: {0}")]
    StreamPauseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Engine has been shut down")]
    ShutDown,

    #[error("DSP error: {0}")]
    DspError(#[from] gesture_fx_dsp::DspError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

impl From<SymphoniaError> for EngineError {
    fn from(err: SymphoniaError) -> Self {
        match err {
            SymphoniaError::Unsupported(what) => EngineError::UnsupportedFormat(what.into()),
            other => EngineError::DecodeError(other.to_string()),
        }
    }
}
