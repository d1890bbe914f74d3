//! Platform Error Types

use thiserror::Error;

/// Errors from LED strips and control inputs
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("LED count mismatch: strip has {expected} LEDs, got {got} colors")]
    LedCountMismatch { expected: usize, got: usize },

    #[error("LED write failed: {0}")]
    LedWriteFailed(String),

    #[error("Failed to bind remote control port {port}: {source}")]
    BindFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
