//! Engine Error Types

use thiserror::Error;

/// Errors that can occur while building or running the pipeline
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No audio input device found")]
    NoInputDevice,

    #[error("Audio device error: {0}")]
    DeviceError(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to play audio stream: {0}")]
    StreamPlayError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid gradient: {0}")]
    InvalidGradient(String),

    #[error("Settings error: {0}")]
    SettingsError(String),

    #[error("Failed to spawn thread: {0}")]
    ThreadSpawnError(String),

    #[error("DSP error: {0}")]
    DspError(#[from] specan_dsp::DspError),

    #[error("Platform error: {0}")]
    PlatformError(#[from] specan_platform::PlatformError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
